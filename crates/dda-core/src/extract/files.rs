use crate::engines::{FilePattern, SeriesSource, SourceLocation};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_RECURSIVE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Directory,
}

/// Entries below `base` whose relative path matches `pattern`, in natural
/// order so `run10` sorts after `run9`.
pub(crate) fn glob_entries(base: &Path, pattern: &FilePattern, kind: EntryKind) -> Vec<PathBuf> {
    let depth = if pattern.pattern.contains("**") {
        MAX_RECURSIVE_DEPTH
    } else {
        pattern.pattern.split('/').count()
    };

    let mut matches = Vec::new();
    collect_entries(base, base, depth, pattern, kind, &mut matches);
    matches.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    matches
}

fn collect_entries(
    base: &Path,
    dir: &Path,
    remaining_depth: usize,
    pattern: &FilePattern,
    kind: EntryKind,
    matches: &mut Vec<PathBuf>,
) {
    if remaining_depth == 0 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_dir = path.is_dir();
        let Ok(relative) = path.strip_prefix(base) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let wanted = match kind {
            EntryKind::File => path.is_file(),
            EntryKind::Directory => is_dir,
        };
        if wanted && pattern.matcher.is_match(relative.as_str()) {
            matches.push(path.clone());
        }
        if is_dir {
            collect_entries(base, &path, remaining_depth - 1, pattern, kind, matches);
        }
    }
}

pub(crate) fn resolve_source(source: &SeriesSource, output_dir: &Path) -> Option<PathBuf> {
    let base = match &source.run_dir {
        Some(run_dir) => glob_entries(output_dir, run_dir, EntryKind::Directory)
            .into_iter()
            .next_back()?,
        None => output_dir.to_path_buf(),
    };

    match &source.location {
        SourceLocation::Exact(relative) => {
            let candidate = base.join(relative);
            candidate.is_file().then_some(candidate)
        }
        SourceLocation::Glob(pattern) => glob_entries(&base, pattern, EntryKind::File)
            .into_iter()
            .next(),
    }
}

pub(crate) fn natural_cmp(lhs: &str, rhs: &str) -> Ordering {
    let mut lhs_chunks = chunks(lhs);
    let mut rhs_chunks = chunks(rhs);
    loop {
        match (lhs_chunks.next(), rhs_chunks.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => {
                let ordering = compare_chunk(a, b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn compare_chunk(lhs: &str, rhs: &str) -> Ordering {
    let lhs_numeric = lhs.bytes().all(|byte| byte.is_ascii_digit());
    let rhs_numeric = rhs.bytes().all(|byte| byte.is_ascii_digit());
    if lhs_numeric && rhs_numeric {
        let lhs_trimmed = lhs.trim_start_matches('0');
        let rhs_trimmed = rhs.trim_start_matches('0');
        return lhs_trimmed
            .len()
            .cmp(&rhs_trimmed.len())
            .then_with(|| lhs_trimmed.cmp(rhs_trimmed))
            .then_with(|| lhs.len().cmp(&rhs.len()));
    }
    lhs.cmp(rhs)
}

fn chunks(value: &str) -> impl Iterator<Item = &str> {
    let mut rest = value;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, ch)| ch.is_ascii_digit() != numeric)
            .map_or(rest.len(), |(index, _)| index);
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::{EntryKind, glob_entries, natural_cmp, resolve_source};
    use crate::engines::{SeriesSource, SourceLocation, compile_glob};
    use std::cmp::Ordering;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        assert_eq!(natural_cmp("run9", "run10"), Ordering::Less);
        assert_eq!(natural_cmp("run010", "run9"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("IntField-Y", "IntField-X"), Ordering::Greater);
    }

    #[test]
    fn glob_entries_respects_separators_and_kind() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::create_dir_all(temp.path().join("run2_sphere")).expect("run dir should be created");
        fs::create_dir_all(temp.path().join("run10_sphere")).expect("run dir should be created");
        fs::write(temp.path().join("run10_sphere/IntField-Y"), "x").expect("file should be written");
        fs::write(temp.path().join("runlog"), "x").expect("file should be written");

        let run_dirs = compile_glob("adda", "run*").expect("glob should compile");
        let dirs = glob_entries(temp.path(), &run_dirs, EntryKind::Directory);
        assert_eq!(
            dirs,
            vec![temp.path().join("run2_sphere"), temp.path().join("run10_sphere")]
        );

        let files = glob_entries(temp.path(), &run_dirs, EntryKind::File);
        assert_eq!(files, vec![temp.path().join("runlog")]);

        let nested = compile_glob("adda", "run*/IntField-*").expect("glob should compile");
        let nested_files = glob_entries(temp.path(), &nested, EntryKind::File);
        assert_eq!(nested_files, vec![temp.path().join("run10_sphere/IntField-Y")]);
    }

    #[test]
    fn resolve_source_picks_last_run_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        for run in ["run000_a", "run001_a"] {
            fs::create_dir_all(temp.path().join(run)).expect("run dir should be created");
            fs::write(temp.path().join(run).join("mueller"), run).expect("file should be written");
        }

        let source = SeriesSource {
            location: SourceLocation::Exact(PathBuf::from("mueller")),
            run_dir: Some(compile_glob("adda", "run*").expect("glob should compile")),
        };
        assert_eq!(
            resolve_source(&source, temp.path()),
            Some(temp.path().join("run001_a/mueller"))
        );

        let missing = SeriesSource {
            location: SourceLocation::Exact(PathBuf::from("absent")),
            run_dir: None,
        };
        assert_eq!(resolve_source(&missing, temp.path()), None);
    }
}
