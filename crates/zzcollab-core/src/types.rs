use crate::error::ZzError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// BuildMode
// ---------------------------------------------------------------------------

/// Package density of a built image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Fast,
    #[default]
    Standard,
    Comprehensive,
}

const FAST_PACKAGES: &[&str] = &[
    "renv",
    "remotes",
    "here",
    "usethis",
    "devtools",
    "testthat",
    "knitr",
    "rmarkdown",
];

const STANDARD_PACKAGES: &[&str] = &[
    "dplyr", "ggplot2", "tidyr", "readr", "purrr", "stringr", "janitor", "broom",
];

const COMPREHENSIVE_PACKAGES: &[&str] = &[
    "tidymodels",
    "shiny",
    "plotly",
    "quarto",
    "targets",
    "data.table",
    "lubridate",
    "forcats",
    "DT",
    "kableExtra",
    "pkgdown",
    "lintr",
    "styler",
];

impl BuildMode {
    pub fn all() -> &'static [BuildMode] {
        &[BuildMode::Fast, BuildMode::Standard, BuildMode::Comprehensive]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Fast => "fast",
            BuildMode::Standard => "standard",
            BuildMode::Comprehensive => "comprehensive",
        }
    }

    /// Value of the `PACKAGE_MODE` build argument.
    pub fn package_density(self) -> &'static str {
        self.as_str()
    }

    /// R packages installed into an image of this density. Each mode is a
    /// superset of the one below it.
    pub fn packages(self) -> Vec<&'static str> {
        let mut pkgs = FAST_PACKAGES.to_vec();
        if matches!(self, BuildMode::Standard | BuildMode::Comprehensive) {
            pkgs.extend_from_slice(STANDARD_PACKAGES);
        }
        if self == BuildMode::Comprehensive {
            pkgs.extend_from_slice(COMPREHENSIVE_PACKAGES);
        }
        pkgs
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildMode {
    type Err = ZzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(BuildMode::Fast),
            "standard" => Ok(BuildMode::Standard),
            "comprehensive" => Ok(BuildMode::Comprehensive),
            _ => Err(ZzError::InvalidBuildMode(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Arch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Docker `--platform` value.
    pub fn platform(self) -> String {
        format!("linux/{}", self.as_str())
    }

    /// Architecture of the running host. Unknown hosts are treated as amd64.
    pub fn host() -> Arch {
        match std::env::consts::ARCH {
            "aarch64" | "arm64" => Arch::Arm64,
            _ => Arch::Amd64,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = ZzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            _ => Err(ZzError::InvalidArch(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_from_str_roundtrip() {
        for mode in BuildMode::all() {
            let parsed: BuildMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, *mode);
        }
        assert!("turbo".parse::<BuildMode>().is_err());
    }

    #[test]
    fn package_lists_grow_with_density() {
        let fast = BuildMode::Fast.packages();
        let standard = BuildMode::Standard.packages();
        let comprehensive = BuildMode::Comprehensive.packages();
        assert!(fast.len() < standard.len());
        assert!(standard.len() < comprehensive.len());
        assert!(fast.iter().all(|p| standard.contains(p)));
        assert!(standard.iter().all(|p| comprehensive.contains(p)));
    }

    #[test]
    fn default_mode_is_standard() {
        assert_eq!(BuildMode::default(), BuildMode::Standard);
    }

    #[test]
    fn arch_aliases_parse() {
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::Amd64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!(Arch::Arm64.platform(), "linux/arm64");
        assert!("riscv".parse::<Arch>().is_err());
    }
}
