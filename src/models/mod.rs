pub mod admin;
pub mod application;
pub mod community;
pub mod document;
pub mod matches;
pub mod medical;
pub mod notification;
pub mod profile;
