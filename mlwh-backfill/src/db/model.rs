pub mod pac_bio;
pub mod product_id_update;
