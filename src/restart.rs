//! Restart file rotation.
//!
//! Simulations typically keep the last few restart files in indexed slots
//! named after a template like `chk###`, where the hash run expands to a
//! zero-padded decimal index. [`restart_rename`] moves a freshly-written
//! file into slot 0 after shifting every existing slot outward by one,
//! dropping slots at or beyond the retention horizon. Rotation is plain
//! filesystem work: it involves no handle and no collective call, so a
//! single rank should perform it.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::error::{raise, Result, Status};

/// Outcome of matching a directory entry against a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexMatch {
    /// The name does not match the template.
    Mismatch,
    /// The name matches; holds the parsed index plus one.
    Next(usize),
    /// The template is malformed, or the incremented index overflows.
    Bad(&'static str),
}

fn byte_at(s: &[u8], i: usize) -> u8 {
    if i < s.len() {
        s[i]
    } else {
        0
    }
}

/// Core of [`next_index`], shared with the directory filter. Reports
/// nothing through the error hook so that scanning stays silent.
fn match_index(template: &str, name: &str) -> IndexMatch {
    let t = template.as_bytes();
    let n = name.as_bytes();

    // Advance both until the first difference or the first hash.
    let mut i = 0;
    while byte_at(t, i) != 0 && byte_at(n, i) != 0 && byte_at(t, i) == byte_at(n, i) {
        i += 1;
    }
    if byte_at(t, i) == 0 {
        return IndexMatch::Bad("template contains no index field");
    }
    if byte_at(t, i) != b'#' {
        return IndexMatch::Mismatch;
    }
    if !byte_at(n, i).is_ascii_digit() {
        return IndexMatch::Mismatch;
    }

    // j: position of the final hash in the template.
    let mut j = i;
    let mut k = i + 1;
    while byte_at(t, k) != 0 {
        if byte_at(t, k) == b'#' {
            j = k;
        }
        k += 1;
    }
    let mut l = n.len();

    // Scan both backwards until the final hash is encountered.
    while k > j && l > i && byte_at(t, k) == byte_at(n, l) {
        k -= 1;
        l -= 1;
    }
    if byte_at(t, k) != b'#' {
        return IndexMatch::Mismatch;
    }

    // The decimal run in the name must span exactly [i, l].
    let mut end = i;
    let mut value: u64 = 0;
    let mut overflow = false;
    while end < n.len() && n[end].is_ascii_digit() {
        value = match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(n[end] - b'0')))
        {
            Some(v) => v,
            None => {
                overflow = true;
                u64::MAX
            }
        };
        end += 1;
    }
    if end != l + 1 {
        return IndexMatch::Mismatch;
    }
    if overflow || value > i32::MAX as u64 - 1 {
        return IndexMatch::Bad("incremented index overflows");
    }

    // The template may contain only a single contiguous hash run.
    while i != j {
        if byte_at(t, i) != b'#' {
            return IndexMatch::Bad("template contains multiple hash runs");
        }
        i += 1;
    }

    IndexMatch::Next(value as usize + 1)
}

/// Increment the index number in `name` when it matches `template`.
///
/// A match requires `name` to agree with `template` character by
/// character before the first `#` and after the last `#`, with one or
/// more decimal digits in between. Returns `Some(index + 1)` on a match
/// and `None` on a mismatch; a malformed template or an index whose
/// increment overflows is an `EInval` error.
pub fn next_index(template: &str, name: &str) -> Result<Option<usize>> {
    match match_index(template, name) {
        IndexMatch::Next(next) => Ok(Some(next)),
        IndexMatch::Mismatch => Ok(None),
        IndexMatch::Bad(what) => raise!(Status::EInval, "{what}: '{template}'"),
    }
}

/// Version-aware name ordering: runs of digits compare numerically,
/// everything else byte-wise.
fn version_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let ra = digit_run(&a[i..]);
            let rb = digit_run(&b[j..]);
            let na = trim_zeros(ra);
            let nb = trim_zeros(rb);
            let ord = na
                .len()
                .cmp(&nb.len())
                .then_with(|| na.cmp(nb))
                .then_with(|| ra.len().cmp(&rb.len()));
            if ord != Ordering::Equal {
                return ord;
            }
            i += ra.len();
            j += rb.len();
        } else {
            if a[i] != b[j] {
                return a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run(s: &[u8]) -> &[u8] {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    &s[..end]
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len() - 1);
    &s[start..]
}

/// Pieces of a template basename around its hash run.
struct Template<'a> {
    prefix: &'a str,
    suffix: &'a str,
    run_len: usize,
}

fn split_template(basename: &str) -> Result<Template<'_>> {
    let Some(first) = basename.find('#') else {
        raise!(
            Status::EInval,
            "template '{basename}' must contain at least one '#'"
        );
    };
    let run_len = basename[first..]
        .bytes()
        .take_while(|&c| c == b'#')
        .count();
    let suffix = &basename[first + run_len..];
    if suffix.contains('#') {
        raise!(
            Status::EInval,
            "template '{basename}' cannot contain multiple nonadjacent '#' runs"
        );
    }
    Ok(Template {
        prefix: &basename[..first],
        suffix,
        run_len,
    })
}

fn decimal_width(value: usize) -> usize {
    let mut digits = 1;
    let mut rest = value / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits
}

/// Rotate `src_path` into index slot 0 of `dst_template`, keeping at most
/// `keep` indexed restart files.
///
/// Existing files matching the template with indices in `[0, keep - 1)`
/// are shifted outward by one; entries whose shifted index would reach
/// `keep` are left untouched rather than removed. The hash run sets the
/// minimum index width and is widened when `keep` needs more digits.
pub fn restart_rename(src_path: &str, dst_template: &str, keep: usize) -> Result<()> {
    if keep < 1 {
        raise!(Status::EInval, "keep must be at least 1");
    }

    // Stat the source early so a missing source is distinguishable from a
    // later rename failure against the destination.
    if fs::metadata(src_path).is_err() {
        raise!(Status::EFailed, "unable to stat source '{src_path}'");
    }

    let template_path = Path::new(dst_template);
    let Some(basename) = template_path.file_name().and_then(|n| n.to_str()) else {
        raise!(Status::EInval, "template '{dst_template}' has no basename");
    };
    let dir = match template_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parts = split_template(basename)?;
    let width = parts.run_len.max(decimal_width(keep));

    // Scan the directory for entries matching the template.
    let Ok(entries) = fs::read_dir(dir) else {
        raise!(
            Status::EFailed,
            "unable to scan directory '{}'",
            dir.display()
        );
    };
    let mut matches: Vec<(String, usize)> = Vec::new();
    for entry in entries.flatten() {
        let Ok(candidate) = entry.file_name().into_string() else {
            continue;
        };
        if let IndexMatch::Next(next) = match_index(basename, &candidate) {
            matches.push((candidate, next));
        }
    }
    matches.sort_by(|(a, _), (b, _)| version_cmp(a, b));

    // Shift in descending order so no rename clobbers a live entry.
    for (candidate, next) in matches.iter().rev() {
        if *next >= keep {
            continue;
        }
        let from = dir.join(candidate);
        let to = dir.join(format!(
            "{}{:0width$}{}",
            parts.prefix, next, parts.suffix,
        ));
        if fs::rename(&from, &to).is_err() {
            raise!(
                Status::EFailed,
                "error renaming '{}' to '{}'",
                from.display(),
                to.display()
            );
        }
    }

    // Finally move the source into slot zero.
    let to = dir.join(format!("{}{:0width$}{}", parts.prefix, 0, parts.suffix));
    if fs::rename(src_path, &to).is_err() {
        raise!(
            Status::EFailed,
            "error renaming '{src_path}' to '{}'",
            to.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_names_increment() {
        assert_eq!(match_index("chk###", "chk000"), IndexMatch::Next(1));
        assert_eq!(match_index("chk###", "chk007"), IndexMatch::Next(8));
        assert_eq!(match_index("chk###", "chk123"), IndexMatch::Next(124));
        // Digit runs need not honor the minimum width.
        assert_eq!(match_index("chk#", "chk12345"), IndexMatch::Next(12346));
        assert_eq!(match_index("a#b", "a9b"), IndexMatch::Next(10));
    }

    #[test]
    fn substituted_templates_round_trip() {
        for d in [0usize, 1, 9, 10, 99, 100, 4711] {
            let name = format!("run{d}.h5");
            assert_eq!(match_index("run##.h5", &name), IndexMatch::Next(d + 1));
        }
    }

    #[test]
    fn non_matching_names_return_mismatch() {
        assert_eq!(match_index("chk###", "chk"), IndexMatch::Mismatch);
        assert_eq!(match_index("chk###", "chx000"), IndexMatch::Mismatch);
        assert_eq!(match_index("chk###", "chk00x"), IndexMatch::Mismatch);
        assert_eq!(match_index("chk###", "chkabc"), IndexMatch::Mismatch);
        assert_eq!(match_index("chk#.h5", "chk3.h6"), IndexMatch::Mismatch);
        // Leading sign is not a digit.
        assert_eq!(match_index("chk#", "chk-3"), IndexMatch::Mismatch);
    }

    #[test]
    fn malformed_templates_are_usage_errors() {
        assert!(matches!(
            match_index("chk", "chk000"),
            IndexMatch::Bad(_)
        ));
        // Digits spanning both hash positions expose the split run.
        assert!(matches!(
            match_index("a#b#c", "a123c"),
            IndexMatch::Bad(_)
        ));
        // With digits only in the first position the name simply fails
        // to match.
        assert_eq!(match_index("a#b#c", "a1b2c"), IndexMatch::Mismatch);
    }

    #[test]
    fn overflowing_increment_is_an_error() {
        let huge = format!("chk{}", u64::MAX);
        assert!(matches!(match_index("chk#", &huge), IndexMatch::Bad(_)));
        let at_limit = format!("chk{}", i32::MAX);
        assert!(matches!(match_index("chk#", &at_limit), IndexMatch::Bad(_)));
        let below_limit = format!("chk{}", i32::MAX - 1);
        assert_eq!(
            match_index("chk#", &below_limit),
            IndexMatch::Next(i32::MAX as usize)
        );
    }

    #[test]
    fn next_index_maps_outcomes() {
        assert_eq!(next_index("chk###", "chk041").unwrap(), Some(42));
        assert_eq!(next_index("chk###", "nope").unwrap(), None);
        assert!(next_index("chk", "chk000").is_err());
    }

    #[test]
    fn version_ordering_is_numeric_in_digit_runs() {
        assert_eq!(version_cmp("chk2", "chk10"), Ordering::Less);
        assert_eq!(version_cmp("chk002", "chk010"), Ordering::Less);
        assert_eq!(version_cmp("chk010", "chk010"), Ordering::Equal);
        assert_eq!(version_cmp("a", "b"), Ordering::Less);
        assert_eq!(version_cmp("chk1", "chk1.old"), Ordering::Less);
    }

    #[test]
    fn template_splitting() {
        let t = split_template("chk###.h5").unwrap();
        assert_eq!((t.prefix, t.suffix, t.run_len), ("chk", ".h5", 3));
        let t = split_template("#").unwrap();
        assert_eq!((t.prefix, t.suffix, t.run_len), ("", "", 1));
        assert!(split_template("plain").is_err());
        assert!(split_template("a#b#").is_err());
    }

    #[test]
    fn widths_widen_with_keep() {
        assert_eq!(decimal_width(1), 1);
        assert_eq!(decimal_width(9), 1);
        assert_eq!(decimal_width(10), 2);
        assert_eq!(decimal_width(1000), 4);
    }
}
