//! Settings for a single subsetting run

use std::{
    fs,
    path::{Path, PathBuf},
};

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::{
    identity::{FontExtensions, DEFAULT_FONT_EXTENSIONS},
    subsetter::DEFAULT_SUBSETTER,
    Args, Error,
};

/// Stylesheets we analyze unless told otherwise
pub const DEFAULT_INCLUDE: &str = r"(?i)\.(css|scss|sass|less|styl|stylus)$";

/// What to analyze, what counts as a font and where subsets go.
///
/// May be loaded from yaml; every field is optional there.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Regexes; a stylesheet must match at least one
    pub include: Vec<String>,
    /// Regexes; a stylesheet matching any is skipped
    pub exclude: Vec<String>,
    /// Regex matched against src urls
    pub font_extensions: String,
    /// Subsets are written here; `<build_dir>/fonts` if unset
    pub cache_dir: Option<PathBuf>,
    /// If set, subset urls are `<public_path>/<file>`
    pub public_path: Option<String>,
    /// Searched for root-relative urls
    pub public_roots: Vec<PathBuf>,
    /// A pyftsubset compatible program
    pub subsetter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            include: vec![DEFAULT_INCLUDE.to_string()],
            exclude: Vec::new(),
            font_extensions: DEFAULT_FONT_EXTENSIONS.to_string(),
            cache_dir: None,
            public_path: None,
            public_roots: Vec::new(),
            subsetter: DEFAULT_SUBSETTER.to_string(),
        }
    }
}

impl Config {
    /// Read a yaml config file.
    pub fn load(path: &Path) -> Result<Config, Error> {
        if !path.is_file() {
            return Err(Error::FileExpected(path.to_path_buf()));
        }
        let yml = fs::read_to_string(path).map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&yml).map_err(Into::into)
    }

    /// The config file named by `args`, if any, overridden by the rest of `args`.
    pub fn from_args(args: &Args) -> Result<Config, Error> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if config.cache_dir.is_none() {
            config.cache_dir = Some(args.build_dir.join("fonts"));
        }
        if !args.include.is_empty() {
            config.include.clone_from(&args.include);
        }
        if !args.exclude.is_empty() {
            config.exclude.clone_from(&args.exclude);
        }
        if let Some(font_extensions) = &args.font_extensions {
            config.font_extensions.clone_from(font_extensions);
        }
        if args.public_path.is_some() {
            config.public_path.clone_from(&args.public_path);
        }
        if !args.public_root.is_empty() {
            config.public_roots.clone_from(&args.public_root);
        }
        if let Some(subsetter) = &args.subsetter {
            config.subsetter.clone_from(subsetter);
        }
        Ok(config)
    }

    /// Where subsets are written.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| Path::new("build").join("fonts"))
    }

    /// Compile the patterns, reporting the first bad one.
    pub fn patterns(&self) -> Result<Patterns, Error> {
        Ok(Patterns {
            include: regex_set(&self.include)?,
            exclude: regex_set(&self.exclude)?,
            font_extensions: FontExtensions::new(&self.font_extensions)?,
        })
    }
}

fn regex_set(patterns: &[String]) -> Result<RegexSet, Error> {
    // check one by one so we can say which pattern is bad
    for pattern in patterns {
        regex::Regex::new(pattern).map_err(|source| Error::BadPattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    RegexSet::new(patterns).map_err(|source| Error::BadPattern {
        pattern: patterns.join(" | "),
        source,
    })
}

/// The compiled patterns of a [`Config`].
#[derive(Debug, Clone)]
pub struct Patterns {
    include: RegexSet,
    exclude: RegexSet,
    pub font_extensions: FontExtensions,
}

impl Patterns {
    /// Should this file be analyzed as a stylesheet?
    pub fn is_stylesheet(&self, path: &Path) -> bool {
        let path = path.to_string_lossy().replace('\\', "/");
        self.include.is_match(&path) && !self.exclude.is_match(&path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    use super::*;

    #[rstest]
    #[case("main.css", true)]
    #[case("theme/_fonts.scss", true)]
    #[case("a.SASS", true)]
    #[case("b.less", true)]
    #[case("c.styl", true)]
    #[case("d.stylus", true)]
    #[case("app.js", false)]
    #[case("main.css.map", false)]
    fn default_include(#[case] path: &str, #[case] expected: bool) {
        let patterns = Config::default().patterns().unwrap();
        assert_eq!(expected, patterns.is_stylesheet(Path::new(path)));
    }

    #[test]
    fn exclude_wins() {
        let config = Config {
            exclude: vec!["node_modules/".to_string()],
            ..Default::default()
        };
        let patterns = config.patterns().unwrap();
        assert!(patterns.is_stylesheet(Path::new("src/main.css")));
        assert!(!patterns.is_stylesheet(Path::new("node_modules/x/main.css")));
    }

    #[test]
    fn bad_pattern_is_named() {
        let config = Config {
            include: vec![r"\.css$".to_string(), "(scss".to_string()],
            ..Default::default()
        };
        let Err(Error::BadPattern { pattern, .. }) = config.patterns() else {
            panic!("Should have failed");
        };
        assert_eq!("(scss", pattern);
    }

    #[test]
    fn partial_yaml() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("fontsub.yml");
        fs::write(&file, "public_path: /assets\nexclude:\n  - vendor/\n").unwrap();
        let config = Config::load(&file).unwrap();
        assert_eq!(
            Config {
                exclude: vec!["vendor/".to_string()],
                public_path: Some("/assets".to_string()),
                ..Default::default()
            },
            config
        );
    }

    #[test]
    fn yaml_round_trip() {
        let config = Config {
            public_roots: vec![PathBuf::from("public")],
            ..Default::default()
        };
        let yml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(config, serde_yaml::from_str::<Config>(&yml).unwrap());
    }

    #[test]
    fn missing_config_file() {
        let temp_dir = tempdir().unwrap();
        let result = Config::load(&temp_dir.path().join("nope.yml"));
        assert!(matches!(result, Err(Error::FileExpected(..))), "{result:?}");
    }

    #[test]
    fn args_override_the_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("fontsub.yml");
        fs::write(&file, "public_path: /assets\nsubsetter: custom\n").unwrap();

        let mut args = Args::for_test(temp_dir.path(), Path::new("css"));
        args.config = Some(file);
        args.public_path = Some("/static".to_string());
        let config = Config::from_args(&args).unwrap();

        assert_eq!(Some("/static"), config.public_path.as_deref());
        assert_eq!("custom", config.subsetter);
    }

    #[test]
    fn cache_dir_follows_build_dir() {
        let args = Args::for_test(Path::new("out"), Path::new("css"));
        let config = Config::from_args(&args).unwrap();
        assert_eq!(Some(Path::new("out").join("fonts")), config.cache_dir);
    }

    #[test]
    fn cache_dir_follows_build_dir_with_a_config_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("fontsub.yml");
        fs::write(&file, "public_path: /assets\n").unwrap();

        let mut args = Args::for_test(Path::new("out"), Path::new("css"));
        args.config = Some(file);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(Path::new("out").join("fonts"), config.cache_dir());
    }

    #[test]
    fn configured_cache_dir_wins() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("fontsub.yml");
        fs::write(&file, "cache_dir: static/fonts\n").unwrap();

        let mut args = Args::for_test(Path::new("out"), Path::new("css"));
        args.config = Some(file);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(Path::new("static/fonts"), config.cache_dir());
    }

    #[test]
    fn default_cache_dir() {
        assert_eq!(Path::new("build").join("fonts"), Config::default().cache_dir());
    }
}
