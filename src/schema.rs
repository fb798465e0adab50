// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use diesel::allow_tables_to_appear_in_same_query;
use diesel::table;

table! {
    profiles (id) {
        id -> Varchar,
        role -> Varchar,
        display_name -> Varchar,
        email -> Nullable<Varchar>,
        date_of_birth -> Nullable<Date>,
        location -> Nullable<Varchar>,
        race -> Nullable<Varchar>,
        progress_stage -> Varchar,
        stage_updated_by -> Nullable<Varchar>,
        stage_updated_at -> Nullable<Timestamptz>,
        transfer_date -> Nullable<Date>,
        transfer_embryo_day -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    surrogate_matches (id) {
        id -> Varchar,
        surrogate_id -> Varchar,
        parent_id -> Nullable<Varchar>,
        secondary_parent_id -> Nullable<Varchar>,
        status -> Varchar,
        sign_date -> Nullable<Date>,
        transfer_date -> Nullable<Date>,
        beta_confirm_date -> Nullable<Date>,
        due_date -> Nullable<Date>,
        legal_clearance_date -> Nullable<Date>,
        medication_start_date -> Nullable<Date>,
        pregnancy_test_date -> Nullable<Date>,
        second_pregnancy_test_date -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    applications (id) {
        id -> Varchar,
        surrogate_id -> Varchar,
        form_data -> Jsonb,
        submitted_at -> Timestamptz,
    }
}

table! {
    medical_infos (surrogate_id) {
        surrogate_id -> Varchar,
        height_cm -> Nullable<Float8>,
        weight_kg -> Nullable<Float8>,
        bmi -> Nullable<Float8>,
        blood_type -> Nullable<Varchar>,
        embryo_grade -> Nullable<Varchar>,
        updated_at -> Timestamptz,
    }
}

table! {
    medical_reports (id) {
        id -> Varchar,
        surrogate_id -> Varchar,
        report_stage -> Varchar,
        exam_date -> Date,
        report_data -> Jsonb,
        proof_image -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

table! {
    posts (id) {
        id -> Varchar,
        author_id -> Varchar,
        surrogate_id -> Varchar,
        stage -> Varchar,
        content -> Text,
        image_url -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

table! {
    comments (id) {
        id -> Varchar,
        post_id -> Varchar,
        author_id -> Varchar,
        parent_comment_id -> Nullable<Varchar>,
        content -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    post_likes (post_id, profile_id) {
        post_id -> Varchar,
        profile_id -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    notifications (id) {
        id -> Varchar,
        recipient_id -> Varchar,
        kind -> Varchar,
        body -> Text,
        read -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    documents (id) {
        id -> Varchar,
        kind -> Varchar,
        surrogate_id -> Nullable<Varchar>,
        parent_id -> Nullable<Varchar>,
        storage_path -> Varchar,
        uploaded_by -> Varchar,
        uploaded_at -> Timestamptz,
    }
}

table! {
    admin_users (id) {
        id -> Varchar,
        display_name -> Varchar,
        created_at -> Timestamptz,
    }
}

allow_tables_to_appear_in_same_query!(
    profiles,
    surrogate_matches,
    applications,
    medical_infos,
    medical_reports,
    posts,
    comments,
    post_likes,
    notifications,
    documents,
    admin_users,
);
