use crate::error::{CoreError, Result};
use crate::value::{ScalarKind, ScalarValue};

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Next key for a table whose existing keys are `existing`.
///
/// Integer keys continue after the current maximum; UUID and text keys get a
/// fresh v4 UUID.
pub fn next_key<'a, I>(kind: &ScalarKind, existing: I) -> Result<ScalarValue>
where
    I: IntoIterator<Item = &'a ScalarValue>,
{
    match kind {
        ScalarKind::Int32 => {
            let max = existing.into_iter().filter_map(ScalarValue::as_i64).max().unwrap_or(0);
            let next = max + 1;
            i32::try_from(next)
                .map(ScalarValue::Int32)
                .map_err(|_| CoreError::out_of_range(kind, next))
        }
        ScalarKind::Int64 => {
            let max = existing.into_iter().filter_map(ScalarValue::as_i64).max().unwrap_or(0);
            max.checked_add(1)
                .map(ScalarValue::Int64)
                .ok_or_else(|| CoreError::out_of_range(kind, max))
        }
        ScalarKind::Uuid => Ok(ScalarValue::Uuid(uuid::Uuid::new_v4())),
        ScalarKind::Text => Ok(ScalarValue::Text(generate_id())),
        other => Err(CoreError::type_mismatch(other, "generated key")),
    }
}
