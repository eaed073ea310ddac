//! Supported web frameworks and their build conventions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Web framework a project is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "nextjs")]
    NextJs,
    #[serde(rename = "sveltekit")]
    SvelteKit,
    #[serde(rename = "react-router")]
    ReactRouter,
}

impl Framework {
    /// Detect the framework from a parsed `package.json`.
    pub fn detect(package: &serde_json::Value) -> Option<Self> {
        let has_dep = |name: &str| {
            ["dependencies", "devDependencies"]
                .iter()
                .any(|section| package.get(section).and_then(|deps| deps.get(name)).is_some())
        };

        if has_dep("next") {
            Some(Self::NextJs)
        } else if has_dep("@sveltejs/kit") {
            Some(Self::SvelteKit)
        } else if has_dep("@react-router/dev") || has_dep("react-router") {
            Some(Self::ReactRouter)
        } else {
            None
        }
    }

    /// Directory a successful build leaves behind, relative to the project root.
    pub fn output_dir(&self) -> &'static str {
        match self {
            Self::NextJs => ".open-next",
            Self::SvelteKit | Self::ReactRouter => "build",
        }
    }

    pub fn default_build_command(&self) -> &'static str {
        match self {
            Self::NextJs => "npx --yes open-next@3 build",
            Self::SvelteKit | Self::ReactRouter => "npm run build",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NextJs => "Next.js",
            Self::SvelteKit => "SvelteKit",
            Self::ReactRouter => "React Router",
        })
    }
}
