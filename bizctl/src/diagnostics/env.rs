//! Presence check for the environment variables the service depends on. Values are never printed.

/// Exit code when a required OAuth variable is missing
pub const EXIT_MISSING_REQUIRED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Sign-in does not work without it; affects the exit code
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvCheck {
    pub group: &'static str,
    pub name: &'static str,
    pub requirement: Requirement,
    pub present: bool,
}

const CHECKED_VARS: &[(&str, &str, Requirement)] = &[
    ("Database", "DATABASE_URL", Requirement::Optional),
    ("SMTP", "SMTP_HOST", Requirement::Optional),
    ("SMTP", "SMTP_PORT", Requirement::Optional),
    ("SMTP", "SMTP_USER", Requirement::Optional),
    ("SMTP", "SMTP_PASS", Requirement::Optional),
    ("Google OAuth", "GOOGLE_CLIENT_ID", Requirement::Required),
    ("Google OAuth", "GOOGLE_CLIENT_SECRET", Requirement::Required),
    ("Microsoft OAuth", "MICROSOFT_CLIENT_ID", Requirement::Required),
    ("Microsoft OAuth", "MICROSOFT_CLIENT_SECRET", Requirement::Required),
    ("Apple OAuth", "APPLE_CLIENT_ID", Requirement::Optional),
    ("Apple OAuth", "APPLE_CLIENT_SECRET", Requirement::Optional),
];

/// Check every variable through `lookup`. Empty values count as missing.
pub fn check_env(lookup: impl Fn(&str) -> Option<String>) -> Vec<EnvCheck> {
    CHECKED_VARS
        .iter()
        .map(|&(group, name, requirement)| EnvCheck {
            group,
            name,
            requirement,
            present: lookup(name).is_some_and(|v| !v.trim().is_empty()),
        })
        .collect()
}

pub fn exit_code(checks: &[EnvCheck]) -> i32 {
    let missing_required = checks
        .iter()
        .any(|c| c.requirement == Requirement::Required && !c.present);
    if missing_required { EXIT_MISSING_REQUIRED } else { 0 }
}

pub fn render_report(checks: &[EnvCheck]) -> String {
    let mut report = String::new();
    let mut group = "";
    for check in checks {
        if check.group != group {
            group = check.group;
            report.push_str(&format!("{group}:\n"));
        }
        let status = match (check.present, check.requirement) {
            (true, _) => "set",
            (false, Requirement::Required) => "MISSING (required)",
            (false, Requirement::Optional) => "not set",
        };
        report.push_str(&format!("  {:<26} {}\n", check.name, status));
    }
    report
}

/// Check the process environment, print the report and return the exit code
pub fn run_check_env() -> i32 {
    let checks = check_env(|name| std::env::var(name).ok());
    print!("{}", render_report(&checks));

    let code = exit_code(&checks);
    if code != 0 {
        println!("\nRequired OAuth configuration is missing.");
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    const ALL_OAUTH: &[(&str, &str)] = &[
        ("GOOGLE_CLIENT_ID", "g"),
        ("GOOGLE_CLIENT_SECRET", "gs"),
        ("MICROSOFT_CLIENT_ID", "m"),
        ("MICROSOFT_CLIENT_SECRET", "ms"),
    ];

    #[test]
    fn test_all_required_present_exits_zero() {
        let checks = check_env(lookup(ALL_OAUTH));
        assert_eq!(exit_code(&checks), 0);
        // Optional variables may be absent
        assert!(!checks.iter().find(|c| c.name == "APPLE_CLIENT_ID").unwrap().present);
    }

    #[test]
    fn test_missing_required_exits_two() {
        let vars: Vec<_> = ALL_OAUTH.iter().copied().filter(|(k, _)| *k != "MICROSOFT_CLIENT_SECRET").collect();
        assert_eq!(exit_code(&check_env(lookup(&vars))), EXIT_MISSING_REQUIRED);
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = ALL_OAUTH.to_vec();
        vars[0] = ("GOOGLE_CLIENT_ID", "  ");
        assert_eq!(exit_code(&check_env(lookup(&vars))), EXIT_MISSING_REQUIRED);
    }

    #[test]
    fn test_report_never_prints_values() {
        let mut vars = ALL_OAUTH.to_vec();
        vars.push(("SMTP_PASS", "hunter2-secret"));
        let report = render_report(&check_env(lookup(&vars)));

        assert!(!report.contains("hunter2-secret"));
        assert!(!report.contains("gs"));
        assert!(report.contains("SMTP_PASS"));
        assert!(report.contains("Google OAuth:"));
    }
}
