use std::path::Path;

/// Location of the Electron framework binary relative to the `Contents`
/// directory of an application bundle.
pub const ELECTRON_FRAMEWORK: &str =
    "Frameworks/Electron Framework.framework/Versions/A/Electron Framework";

/// Existence checks against a filesystem
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;
}

/// Filesystem of the running host
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl Filesystem for HostFs {
    #[inline]
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Builds the path where the Electron framework would live if `exe` were
/// the main executable of an application bundle
/// (`<bundle>/Contents/MacOS/<exe>`). Returns `None` if the path has
/// less than three `/` separated components.
pub fn framework_path(exe: &str) -> Option<String> {
    let components: Vec<&str> = exe.split('/').collect();
    if components.len() < 3 {
        return None;
    }

    let contents = components[..components.len() - 2].join("/");
    Some(format!("{contents}/{ELECTRON_FRAMEWORK}"))
}

/// Tells whether `exe` is the executable of an Electron application. The
/// path is taken as it has been invoked, it is never canonicalized.
pub fn is_electron_app<F: Filesystem>(fs: &F, exe: &str) -> bool {
    if !fs.exists(Path::new(exe)) {
        return false;
    }

    framework_path(exe)
        .map(|fw| fs.exists(Path::new(&fw)))
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test {
    use std::{
        collections::HashSet,
        fs,
        path::{Path, PathBuf},
    };

    use super::*;

    /// In memory filesystem only knowing about the paths it is given
    #[derive(Debug, Default, Clone)]
    pub(crate) struct MemFs(HashSet<PathBuf>);

    impl MemFs {
        pub(crate) fn with<P: AsRef<Path>>(mut self, p: P) -> Self {
            self.0.insert(p.as_ref().to_path_buf());
            self
        }

        /// Filesystem containing an Electron bundle for `exe`
        pub(crate) fn electron(exe: &str) -> Self {
            Self::default()
                .with(exe)
                .with(framework_path(exe).unwrap())
        }
    }

    impl Filesystem for MemFs {
        fn exists(&self, path: &Path) -> bool {
            self.0.contains(path)
        }
    }

    #[test]
    fn test_framework_path() {
        assert_eq!(
            framework_path("/Apps/Foo.app/Contents/MacOS/Foo").unwrap(),
            "/Apps/Foo.app/Contents/Frameworks/Electron Framework.framework/Versions/A/Electron Framework"
        );
        // no canonicalization takes place
        assert_eq!(
            framework_path("../Foo.app/Contents/MacOS/Foo").unwrap(),
            "../Foo.app/Contents/Frameworks/Electron Framework.framework/Versions/A/Electron Framework"
        );
        assert_eq!(
            framework_path("a/b/c").unwrap(),
            format!("a/{ELECTRON_FRAMEWORK}")
        );
        assert_eq!(framework_path("/Foo"), None);
        assert_eq!(framework_path("Foo"), None);
        assert_eq!(framework_path("a/b"), None);
    }

    #[test]
    fn test_electron_app_in_memory() {
        let exe = "/Apps/Foo.app/Contents/MacOS/Foo";
        assert!(is_electron_app(&MemFs::electron(exe), exe));

        // framework missing
        assert!(!is_electron_app(&MemFs::default().with(exe), exe));

        // executable missing
        let fs = MemFs::default().with(framework_path(exe).unwrap());
        assert!(!is_electron_app(&fs, exe));

        // too few components even though the path exists
        assert!(!is_electron_app(&MemFs::default().with("/Foo"), "/Foo"));
    }

    #[test]
    fn test_electron_app_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let macos = dir.path().join("Foo.app/Contents/MacOS");
        let exe = macos.join("Foo");
        fs::create_dir_all(&macos).unwrap();
        fs::write(&exe, b"").unwrap();

        let exe = exe.to_string_lossy().to_string();
        assert!(!is_electron_app(&HostFs, &exe));

        let fw = PathBuf::from(framework_path(&exe).unwrap());
        fs::create_dir_all(fw.parent().unwrap()).unwrap();
        fs::write(&fw, b"").unwrap();
        assert!(is_electron_app(&HostFs, &exe));

        assert!(!is_electron_app(
            &HostFs,
            &dir.path().join("Foo.app/Contents/MacOS/Bar").to_string_lossy()
        ));
    }
}
