//! Diesel schema for task record persistence.

diesel::table! {
    /// Per-ticket pipeline state.
    task_processing (ticket_id) {
        /// External ticket key.
        ticket_id -> Text,
        /// Overall task status.
        #[max_length = 20]
        task_status -> Varchar,
        /// Compliance stage status.
        #[max_length = 20]
        stage1_status -> Varchar,
        /// Generation stage status.
        #[max_length = 20]
        stage2_status -> Varchar,
        /// Compliance stage error text.
        stage1_error -> Nullable<Text>,
        /// Generation stage error text.
        stage2_error -> Nullable<Text>,
        /// Compliance score in `0..=100`.
        compliance_score -> Nullable<SmallInt>,
        /// Number of re-entries after a return.
        return_count -> Integer,
        /// Last external status seen by ingestion.
        last_external_status -> Nullable<Text>,
        /// Whether the skip code was found.
        skip_detected -> Bool,
        /// When the current block started.
        blocked_at -> Nullable<Timestamptz>,
        /// When the blocked stage becomes eligible for retry.
        blocked_retry_at -> Nullable<Timestamptz>,
        /// Why the task is blocked.
        block_reason -> Nullable<Text>,
        /// Latest task-level error message.
        error_message -> Nullable<Text>,
        /// When the pipeline last touched the task.
        last_processed_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
