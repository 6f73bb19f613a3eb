pub mod db_utils;
pub mod login_index;
pub mod validation;
