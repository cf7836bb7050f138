//! The PacBio slice of the ML warehouse schema.
//!
//! Only the tables and columns read or written by the product id backfill are
//! declared here. Column types follow `db/migrations`.

diesel::table! {
    /// Run/library/well/tag records loaded from the LIMS
    pac_bio_run (id_pac_bio_tmp) {
        id_pac_bio_tmp -> Int4,
        /// Timestamp of last update
        last_updated -> Timestamp,
        /// Timestamp of warehouse update
        recorded_at -> Timestamp,
        /// LIM system identifier
        id_lims -> Varchar,
        /// Lims specific identifier for the pacbio run
        id_pac_bio_run_lims -> Varchar,
        /// The well identifier for the plate, A1-H12
        well_label -> Varchar,
        /// Tag index within tag set, NULL if untagged
        tag_identifier -> Nullable<Varchar>,
        /// Tag sequence for tag
        tag_sequence -> Nullable<Varchar>,
        tag2_identifier -> Nullable<Varchar>,
        tag2_sequence -> Nullable<Varchar>,
        /// Name of the run
        pac_bio_run_name -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Status and run information by well and some basic QC data from SMRT Link
    pac_bio_run_well_metrics (id_pac_bio_rw_metrics_tmp) {
        id_pac_bio_rw_metrics_tmp -> Int4,
        /// Lims specific identifier for the pacbio run
        pac_bio_run_name -> Varchar,
        /// The well identifier for the plate, A1-H12
        well_label -> Varchar,
        /// The instrument type e.g. Sequel
        instrument_type -> Varchar,
        /// Product id
        id_pac_bio_product -> Nullable<Varchar>,
        /// Current sequencing QC state
        qc_seq_state -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// A linking table for the pac_bio_run and pac_bio_run_well_metrics tables
    pac_bio_product_metrics (id_pac_bio_pr_metrics_tmp) {
        id_pac_bio_pr_metrics_tmp -> Int4,
        /// PacBio run well metrics id, see "pac_bio_run_well_metrics.id_pac_bio_rw_metrics_tmp"
        id_pac_bio_rw_metrics_tmp -> Int4,
        /// PacBio run id, see "pac_bio_run.id_pac_bio_tmp"
        id_pac_bio_tmp -> Nullable<Int4>,
        /// Product id
        id_pac_bio_product -> Nullable<Varchar>,
        /// The final QC outcome of the product as 0(failed), 1(passed) or NULL
        qc -> Nullable<Int2>,
    }
}

diesel::joinable!(pac_bio_product_metrics -> pac_bio_run (id_pac_bio_tmp));
diesel::joinable!(pac_bio_product_metrics -> pac_bio_run_well_metrics (id_pac_bio_rw_metrics_tmp));

diesel::allow_tables_to_appear_in_same_query!(
    pac_bio_run,
    pac_bio_run_well_metrics,
    pac_bio_product_metrics,
);
