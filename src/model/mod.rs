pub mod attendance;
pub mod employee;
pub mod job;
pub mod leave_request;
pub mod payroll;
pub mod reference;
pub mod role;
pub mod system_log;
pub mod user;

/// Lets a strum enum be read straight out of a VARCHAR column with
/// `#[sqlx(try_from = "String")]`.
macro_rules! string_column {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = strum::ParseError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )+
    };
}

pub(crate) use string_column;
