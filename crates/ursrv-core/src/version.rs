//! Release-aware ordering of version strings such as `v1.27.3-rc.2`.
//!
//! Release components compare numerically, so `v1.10.0` sorts after
//! `v1.9.0`. A pre-release sorts before its release. Build metadata after
//! `+` is ignored.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum PreRelease<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl Ord for PreRelease<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PreRelease::Numeric(a), PreRelease::Numeric(b)) => a.cmp(b),
            (PreRelease::Text(a), PreRelease::Text(b)) => a.cmp(b),
            (PreRelease::Numeric(_), PreRelease::Text(_)) => Ordering::Less,
            (PreRelease::Text(_), PreRelease::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for PreRelease<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn version_parts(version: &str) -> (Vec<u64>, Vec<PreRelease<'_>>) {
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);
    let version = version.split('+').next().unwrap_or_default();

    let (release, pre) = match version.split_once('-') {
        Some((release, pre)) => (release, Some(pre)),
        None => (version, None),
    };

    // Unparsable release components count as zero.
    let release = release
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect();

    let pre = pre
        .map(|pre| {
            pre.split('.')
                .map(|part| match part.parse::<u64>() {
                    Ok(n) => PreRelease::Numeric(n),
                    Err(_) => PreRelease::Text(part),
                })
                .collect()
        })
        .unwrap_or_default();

    (release, pre)
}

/// Compare two version strings by release precedence.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_release, a_pre) = version_parts(a);
    let (b_release, b_pre) = version_parts(b);

    for (x, y) in a_release.iter().zip(&b_release) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    // With an equal common prefix the longer release is newer.
    match a_release.len().cmp(&b_release.len()) {
        Ordering::Equal => {}
        other => return other,
    }

    match (a_pre.is_empty(), b_pre.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    for (x, y) in a_pre.iter().zip(&b_pre) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a_pre.len().cmp(&b_pre.len())
}
