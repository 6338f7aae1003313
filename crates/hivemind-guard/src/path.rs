use std::path::{Component, Path, PathBuf};

/// Errors raised by path validation.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
  #[error("invalid base directory '{path}': {source}")]
  InvalidBase {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("path traversal attempt detected: '{target}' is outside '{base}'")]
  Traversal { target: PathBuf, base: PathBuf },
}

/// Resolve `target` against `base_dir` and require it to stay strictly inside.
///
/// Both paths are made absolute and normalized lexically, so targets that do
/// not exist yet can be checked. When the resolved target exists, symlinks are
/// resolved as well and the check is repeated against the canonical base.
pub fn validate_path(
  base_dir: impl AsRef<Path>,
  target: impl AsRef<Path>,
) -> Result<PathBuf, GuardError> {
  let base_dir = base_dir.as_ref();
  let target = target.as_ref();

  let base = std::path::absolute(base_dir)
    .map(|p| normalize(&p))
    .map_err(|e| GuardError::InvalidBase {
      path: base_dir.to_path_buf(),
      source: e,
    })?;

  let resolved = resolve_within(&base, target).ok_or_else(|| traversal(target, &base))?;
  ensure_descendant(&resolved, &base, target)?;

  if let Ok(canonical) = resolved.canonicalize() {
    let canonical_base = base.canonicalize().map_err(|e| GuardError::InvalidBase {
      path: base_dir.to_path_buf(),
      source: e,
    })?;
    ensure_descendant(&canonical, &canonical_base, target)?;
    return Ok(canonical);
  }

  Ok(resolved)
}

fn ensure_descendant(resolved: &Path, base: &Path, target: &Path) -> Result<(), GuardError> {
  if resolved != base && resolved.starts_with(base) {
    Ok(())
  } else {
    Err(traversal(target, base))
  }
}

fn traversal(target: &Path, base: &Path) -> GuardError {
  GuardError::Traversal {
    target: target.to_path_buf(),
    base: base.to_path_buf(),
  }
}

/// Join `target` onto `base` lexically.
///
/// Returns `None` as soon as a `..` step would climb above `base`, or above
/// the root for absolute targets, instead of clamping at the root.
fn resolve_within(base: &Path, target: &Path) -> Option<PathBuf> {
  let mut out = if target.is_absolute() {
    PathBuf::new()
  } else {
    base.to_path_buf()
  };
  let mut depth = 0usize;
  for component in target.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        depth = depth.checked_sub(1)?;
        out.pop();
      }
      Component::Normal(part) => {
        out.push(part);
        depth += 1;
      }
      Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
    }
  }
  Some(out)
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rejects_parent_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let result = validate_path(dir.path(), "../../etc/passwd");
    assert!(matches!(result, Err(GuardError::Traversal { .. })));
  }

  #[cfg(unix)]
  #[test]
  fn test_rejects_traversal_from_root() {
    assert!(validate_path("/", "../../etc/passwd").is_err());
    assert!(validate_path("/", "/../etc/passwd").is_err());
    assert_eq!(
      validate_path("/", "etc/hostname-missing").unwrap(),
      PathBuf::from("/etc/hostname-missing")
    );
  }

  #[test]
  fn test_rejects_climb_above_base_even_when_returning() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("docs");
    assert!(validate_path(&base, "../docs/file.txt").is_err());
    assert!(validate_path(&base, "sub/../file.txt").is_ok());
  }

  #[test]
  fn test_rejects_traversal_for_relative_base() {
    let result = validate_path("data/documents", "../../etc/passwd");
    assert!(matches!(result, Err(GuardError::Traversal { .. })));
  }

  #[test]
  fn test_accepts_nested_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    let resolved = validate_path(dir.path(), "sub/file.txt").unwrap();
    assert!(resolved.ends_with("sub/file.txt"));
    assert!(resolved.is_absolute());
  }

  #[test]
  fn test_accepts_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub/file.txt"), "hello").unwrap();

    let resolved = validate_path(dir.path(), "sub/file.txt").unwrap();
    assert_eq!(std::fs::read_to_string(resolved).unwrap(), "hello");
  }

  #[test]
  fn test_rejects_base_itself() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_path(dir.path(), ".").is_err());
    assert!(validate_path(dir.path(), "sub/..").is_err());
  }

  #[test]
  fn test_rejects_sibling_with_common_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("docs");
    let result = validate_path(&base, "../docs2/file.txt");
    assert!(result.is_err());
  }

  #[test]
  fn test_rejects_absolute_target_outside_base() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_path(dir.path(), "/etc/passwd").is_err());
  }

  #[cfg(unix)]
  #[test]
  fn test_rejects_symlink_escape() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();

    let base = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(outside.path(), base.path().join("link")).unwrap();

    let result = validate_path(base.path(), "link/secret.txt");
    assert!(matches!(result, Err(GuardError::Traversal { .. })));
  }
}
