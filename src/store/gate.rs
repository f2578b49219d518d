use crate::tree::Value;

/// Decides whether a freshly materialized tree should be broadcast.
///
/// The first publish always goes out. After that only the top level is
/// compared: keys must match and every value must be [`Value::same`] as its
/// counterpart. A nested table rebuilt with equal contents is a different
/// reference and therefore counts as a change, while a change buried inside
/// a table that kept its reference goes unnoticed.
pub fn should_publish(previous: Option<&Value>, next: &Value) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    if previous.same(next) {
        return false;
    }

    match (previous, next) {
        (Value::Table(a), Value::Table(b)) => {
            a.len() != b.len()
                || a.iter().any(|(key, value)| {
                    b.get(key.as_str())
                        .map_or(true, |other| !value.same(other))
                })
        }
        _ => true,
    }
}
