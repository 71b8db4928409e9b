//! Kubernetes-safe names.

/// Maximum length of a DNS-1123 label.
pub const DNS_LABEL_MAX: usize = 63;
/// Maximum length of a named container/service port (IANA service name).
pub const PORT_NAME_MAX: usize = 15;

/// Lowercase, replace anything outside `[a-z0-9]` with `-`, collapse runs,
/// trim dashes, and cap at 63 characters. Never returns an empty string.
pub fn dns_label(raw: &str) -> String {
    let label = squash(raw, DNS_LABEL_MAX);
    if label.is_empty() {
        "app".to_owned()
    } else {
        label
    }
}

/// `<base>-<suffix>` as a DNS label. The base is shortened first so the
/// suffix always survives the 63-character cap.
pub fn suffixed_label(base: &str, suffix: &str) -> String {
    let budget = DNS_LABEL_MAX.saturating_sub(suffix.len() + 1);
    let base = squash(base, budget);
    let base = if base.is_empty() { "app" } else { base.as_str() };
    dns_label(&format!("{base}-{suffix}"))
}

/// Stable name for the `index`-th (1-based) exposed port of a listener.
///
/// Always starts with a letter, stays within 15 characters, and stays
/// unique across indexes because the index is never truncated away.
pub fn port_name(index: usize, listener: &str) -> String {
    let prefix = format!("port-{index}");
    let budget = PORT_NAME_MAX.saturating_sub(prefix.len() + 1);
    let suffix = squash(listener, budget);
    if suffix.is_empty() {
        prefix
    } else {
        format!("{prefix}-{suffix}")
    }
}

fn squash(raw: &str, max: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.truncate(max);
    out.trim_end_matches('-').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_label_sanitizes() {
        assert_eq!(dns_label("Hello_World.svc"), "hello-world-svc");
        assert_eq!(dns_label("__ep__"), "ep");
        assert_eq!(dns_label("***"), "app");
    }

    #[test]
    fn suffixed_label_keeps_suffix_within_limit() {
        assert_eq!(suffixed_label("hello-config", "volume"), "hello-config-volume");
        let long = "x".repeat(DNS_LABEL_MAX);
        let label = suffixed_label(&long, "volume");
        assert_eq!(label.len(), DNS_LABEL_MAX);
        assert!(label.ends_with("-volume"));
    }

    #[test]
    fn port_name_keeps_index() {
        assert_eq!(port_name(1, "helloEp"), "port-1-helloep");
        assert_eq!(port_name(2, "averyveryverylonglistener"), "port-2-averyver");
        assert_eq!(port_name(3, "_"), "port-3");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn dns_label_is_always_valid(raw in ".{0,100}") {
                let label = dns_label(&raw);
                prop_assert!(!label.is_empty());
                prop_assert!(label.len() <= DNS_LABEL_MAX);
                prop_assert!(label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                prop_assert!(!label.starts_with('-'));
                prop_assert!(!label.ends_with('-'));
            }

            #[test]
            fn suffixed_label_is_always_valid(raw in ".{0,100}") {
                let label = suffixed_label(&raw, "volume");
                prop_assert!(label.len() <= DNS_LABEL_MAX);
                prop_assert!(label.ends_with("-volume"));
                prop_assert!(!label.starts_with('-'));
            }

            #[test]
            fn port_names_are_short_and_distinct(
                raw in "[A-Za-z_.-]{0,40}",
                a in 1usize..99,
                b in 1usize..99,
            ) {
                let first = port_name(a, &raw);
                prop_assert!(first.len() <= PORT_NAME_MAX);
                prop_assert!(!first.ends_with('-'));
                if a != b {
                    prop_assert_ne!(first, port_name(b, &raw));
                }
            }
        }
    }
}
