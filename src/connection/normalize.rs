//! Server connection string normalization.

/// Option appended when multiple active result sets are not requested.
const MULTIPLE_RESULT_SETS: &str = "MultipleActiveResultSets=True;";

/// Option appended when neither credentials nor integrated auth are given.
const INTEGRATED_SECURITY: &str = "Integrated Security=True;";

/// Option appended when explicit credentials are given.
const PERSIST_SECURITY_INFO: &str = "Persist Security Info=True;";

/// Completes a server connection string with the options the relational
/// backend relies on.
///
/// Applied in order:
///
/// - a trailing `;` terminator
/// - `MultipleActiveResultSets=True`
/// - `Integrated Security=True`, unless `user id` or `integrated security`
///   is already present
/// - `Persist Security Info=True`, when `user id` is present
///
/// Option detection is case-insensitive. The function is idempotent:
/// normalizing an already-normalized string returns it unchanged.
///
/// # Examples
///
/// ```
/// use workspace_factory::connection::normalize_server_connection;
///
/// let once = normalize_server_connection("Server=db;User Id=sa;Password=x");
/// assert_eq!(
///     once,
///     "Server=db;User Id=sa;Password=x; MultipleActiveResultSets=True; Persist Security Info=True;"
/// );
/// assert_eq!(normalize_server_connection(&once), once);
/// ```
#[must_use]
pub fn normalize_server_connection(raw: &str) -> String {
    let mut cs = raw.to_string();
    if !cs.trim().ends_with(';') {
        cs.push(';');
    }

    let lower = cs.to_lowercase();
    let has_credentials = lower.contains("user id");

    if !lower.contains("multipleactiveresultsets") {
        append_option(&mut cs, MULTIPLE_RESULT_SETS);
    }
    if !has_credentials && !lower.contains("integrated security") {
        append_option(&mut cs, INTEGRATED_SECURITY);
    }
    if has_credentials && !lower.contains("persist security info") {
        append_option(&mut cs, PERSIST_SECURITY_INFO);
    }

    cs
}

fn append_option(cs: &mut String, option: &str) {
    cs.push(' ');
    cs.push_str(option);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_adds_terminator_and_defaults() {
        assert_eq!(
            normalize_server_connection("Server=X;Database=Y"),
            "Server=X;Database=Y; MultipleActiveResultSets=True; Integrated Security=True;"
        );
    }

    #[test]
    fn test_keeps_existing_terminator() {
        assert_eq!(
            normalize_server_connection("Server=X;Database=Y;"),
            "Server=X;Database=Y; MultipleActiveResultSets=True; Integrated Security=True;"
        );
    }

    #[test]
    fn test_trailing_whitespace_after_terminator() {
        let normalized = normalize_server_connection("Server=X; ");
        assert_eq!(
            normalized,
            "Server=X;  MultipleActiveResultSets=True; Integrated Security=True;"
        );
        assert_eq!(normalize_server_connection(&normalized), normalized);
    }

    #[test]
    fn test_credentials_request_persisted_security_info() {
        let normalized = normalize_server_connection("Server=X;User ID=sa;Password=p;");
        assert!(normalized.contains("Persist Security Info=True;"));
        assert!(!normalized.contains("Integrated Security"));
    }

    #[test]
    fn test_explicit_integrated_security_is_respected() {
        let raw = "Server=X;Integrated Security=SSPI;MultipleActiveResultSets=false;";
        assert_eq!(normalize_server_connection(raw), raw);
    }

    #[test]
    fn test_existing_options_case_insensitive() {
        let raw = "server=x;MULTIPLEACTIVERESULTSETS=true;user id=a;PERSIST SECURITY INFO=false;";
        assert_eq!(normalize_server_connection(raw), raw);
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[A-Za-z =;.]{0,40}") {
            let once = normalize_server_connection(&raw);
            let twice = normalize_server_connection(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalization_with_credentials_is_idempotent(
            server in "[a-z]{1,10}",
            user in "[a-z]{1,10}",
        ) {
            let raw = format!("Server={server};User Id={user}");
            let once = normalize_server_connection(&raw);
            prop_assert_eq!(normalize_server_connection(&once), once.clone());
            prop_assert!(once.ends_with(';'));
        }
    }
}
