//! Type token helpers
//!
//! Tokens have the form `castai:<module>:<Name>`; data sources carry the
//! `DataSource` suffix.

pub const PACKAGE: &str = "castai";

/// Module names used in type tokens
pub mod modules {
    pub const INDEX: &str = "index";
    pub const AWS: &str = "aws";
    pub const GCP: &str = "gcp";
    pub const AZURE: &str = "azure";
    pub const IAM: &str = "iam";
    pub const AUTOSCALING: &str = "autoscaling";
    pub const ORGANIZATION: &str = "organization";
    pub const NODECONFIG: &str = "nodeconfig";
    pub const REBALANCING: &str = "rebalancing";
    pub const WORKLOAD: &str = "workload";
    pub const SECURITY: &str = "security";

    pub const ALL: &[&str] = &[
        INDEX,
        AWS,
        GCP,
        AZURE,
        IAM,
        AUTOSCALING,
        ORGANIZATION,
        NODECONFIG,
        REBALANCING,
        WORKLOAD,
        SECURITY,
    ];
}

pub const DATA_SOURCE_SUFFIX: &str = "DataSource";

/// Upper-case the first character
pub fn title(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build `castai:<module>:<Title(name)><suffix>`
pub fn make_member_token(module: &str, name: &str, suffix: &str) -> String {
    format!("{}:{}:{}{}", PACKAGE, module, title(name), suffix)
}

/// Split a token into `(module, member)`
pub fn parse_token(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.splitn(3, ':');
    if parts.next()? != PACKAGE {
        return None;
    }
    let module = parts.next()?;
    let member = parts.next()?;
    if module.is_empty() || member.is_empty() {
        return None;
    }
    Some((module, member))
}

/// True when `token` is exactly `castai:<known module>:<Title(name)><suffix>`
pub fn is_canonical(token: &str, suffix: &str) -> bool {
    let Some((module, member)) = parse_token(token) else {
        return false;
    };
    modules::ALL.contains(&module)
        && member
            .strip_suffix(suffix)
            .is_some_and(|name| !name.is_empty() && make_member_token(module, name, suffix) == token)
}
