// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

pub mod applications;
pub mod community;
pub mod documents;
pub mod health;
pub mod matches;
pub mod medical;
pub mod metrics;
pub mod notifications;
pub mod profiles;
pub mod statistics;
