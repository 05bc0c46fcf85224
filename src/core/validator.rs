// src/core/validator.rs

//! Target validation. Nothing reaches a subprocess argument list or an outbound
//! URL without going through here first.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::JobError;
use crate::core::models::TargetGrammar;

// One or more labels of 1-63 alphanumerics/hyphens with alphanumeric ends,
// followed by an alphabetic TLD of 2-63 characters.
static RE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}$").unwrap()
});

static RE_IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
    )
    .unwrap()
});

/// Returns true if `s` is a syntactically valid domain name.
pub fn is_valid_domain(s: &str) -> bool {
    RE_DOMAIN.is_match(s)
}

/// Returns true if `s` is a dotted-quad IPv4 address with every octet in 0-255.
pub fn is_valid_ipv4(s: &str) -> bool {
    RE_IPV4.is_match(s)
}

/// A target that has passed validation.
///
/// The fields are private to this module, so the constructors below are the
/// only way to obtain one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    grammar: TargetGrammar,
    value: String,
}

impl Target {
    pub fn domain(s: &str) -> Result<Target, JobError> {
        if is_valid_domain(s) {
            Ok(Target { grammar: TargetGrammar::Domain, value: s.to_string() })
        } else {
            Err(JobError::InvalidTarget(format!("not a valid domain: {s:?}")))
        }
    }

    pub fn ipv4(s: &str) -> Result<Target, JobError> {
        if is_valid_ipv4(s) {
            Ok(Target { grammar: TargetGrammar::Ipv4, value: s.to_string() })
        } else {
            Err(JobError::InvalidTarget(format!("not a valid IPv4 address: {s:?}")))
        }
    }

    /// Classifies `s` against the given grammar.
    pub fn parse(s: &str, grammar: TargetGrammar) -> Result<Target, JobError> {
        match grammar {
            TargetGrammar::Domain => Target::domain(s),
            TargetGrammar::Ipv4 => Target::ipv4(s),
        }
    }

    pub fn grammar(&self) -> TargetGrammar {
        self.grammar
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Independent restatement of the label rules, used to cross-check the regex.
    fn labels_ok(s: &str) -> bool {
        let labels: Vec<&str> = s.split('.').collect();
        if labels.len() < 2 {
            return false;
        }
        let (tld, rest) = labels.split_last().unwrap();
        (2..=63).contains(&tld.len())
            && tld.chars().all(|c| c.is_ascii_alphabetic())
            && rest.iter().all(|l| {
                (1..=63).contains(&l.len())
                    && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                    && !l.starts_with('-')
                    && !l.ends_with('-')
            })
    }

    #[test]
    fn accepts_ordinary_domains() {
        for d in ["example.com", "mail.example.co.uk", "a.io", "x-1.y2.example.org", "123.example.net"] {
            assert!(is_valid_domain(d), "{d} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_domains() {
        for d in [
            "",
            "localhost",
            "example.c",
            "example.c0m",
            "-bad.com",
            "bad-.com",
            "exa mple.com",
            "example..com",
            ".example.com",
            "example.com.",
            "example.com; rm -rf /",
            "$(whoami).example.com",
            "-oX.com",
        ] {
            assert!(!is_valid_domain(d), "{d:?} should be rejected");
        }
    }

    #[test]
    fn label_length_boundary() {
        let ok = format!("{}.com", "a".repeat(63));
        let too_long = format!("{}.com", "a".repeat(64));
        assert!(is_valid_domain(&ok));
        assert!(!is_valid_domain(&too_long));
    }

    #[test]
    fn final_label_length_boundary() {
        let ok = format!("example.{}", "a".repeat(63));
        let too_long = format!("example.{}", "a".repeat(64));
        assert!(is_valid_domain(&ok));
        assert!(!is_valid_domain(&too_long));
        assert!(labels_ok(&ok));
        assert!(!labels_ok(&too_long));
    }

    #[test]
    fn regex_agrees_with_label_rules() {
        let samples = [
            "example.com", "a-b.c-d.com", "a.b", "1.2.3.4", "foo.-bar.com", "foo.bar-.com",
            "x.y.zz", "under_score.com", "UPPER.CASE.ORG", "a..b.com", "ab.c1",
            "xn--bcher-kva.example", "trailing.dot.", "q.q.q.q.q.qq",
        ];
        for s in samples {
            assert_eq!(is_valid_domain(s), labels_ok(s), "disagreement on {s:?}");
        }
    }

    #[test]
    fn ipv4_octets_stay_in_range() {
        for ip in ["0.0.0.0", "8.8.8.8", "192.168.1.254", "255.255.255.255", "01.02.03.004"] {
            assert!(is_valid_ipv4(ip), "{ip} should be valid");
        }
        for ip in ["999.1.1.1", "256.0.0.1", "1.2.3", "1.2.3.4.5", "1.2.3.-4", "a.b.c.d", "", "1.2.3.4 "] {
            assert!(!is_valid_ipv4(ip), "{ip:?} should be rejected");
        }
    }

    #[test]
    fn accepted_ipv4_decomposes_into_four_bytes() {
        for ip in ["10.0.0.1", "172.16.254.3", "0.0.0.0", "199.250.25.5"] {
            assert!(is_valid_ipv4(ip));
            let octets: Vec<u32> = ip.split('.').map(|o| o.parse().unwrap()).collect();
            assert_eq!(octets.len(), 4);
            assert!(octets.iter().all(|o| *o <= 255));
        }
    }

    #[test]
    fn targets_only_come_from_matching_grammar() {
        let target = Target::parse("example.com", TargetGrammar::Domain).unwrap();
        assert_eq!(target.as_str(), "example.com");
        assert_eq!(target.grammar(), TargetGrammar::Domain);
        assert_eq!(Target::parse("8.8.8.8", TargetGrammar::Ipv4).unwrap().grammar(), TargetGrammar::Ipv4);
        assert!(Target::parse("example.com", TargetGrammar::Ipv4).is_err());
        assert!(matches!(
            Target::parse("999.1.1.1", TargetGrammar::Ipv4),
            Err(JobError::InvalidTarget(_))
        ));
    }
}
