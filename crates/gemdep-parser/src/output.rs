//! The structured record the parser produces (§3, §6).

/// One `gem`/`pod`/`add_dependency`-shaped declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct GemDeclaration {
    /// Package name. Always non-empty for a declaration that made it into
    /// the output.
    pub name: String,
    /// Version constraints, in the order they were written, each already
    /// normalized (§4.2 step 6).
    pub versions: Vec<String>,
    /// Git source hint (`git:` or `github:`), if any.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub git: Option<String>,
    /// Path source hint (`path:`), if any.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub path: Option<String>,
    /// `require:` load flag, if given explicitly.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub require: Option<bool>,
    /// Effective group labels, omitted entirely for development
    /// declarations and for declarations that carried a trailing
    /// conditional (§4.2).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub groups: Option<Vec<String>>,
    /// Effective platform labels; always present, possibly empty.
    pub platforms: Vec<String>,
}

impl GemDeclaration {
    /// Start a bare declaration for `name` with every other field at its
    /// empty default.
    pub fn new(name: impl Into<String>) -> Self {
        GemDeclaration { name: name.into(), ..Default::default() }
    }
}

/// The two dependency buckets a [`GemDeclaration`] can land in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Groups {
    /// Declarations not scoped to a development/test group.
    pub runtime: Vec<GemDeclaration>,
    /// Declarations scoped to a `development` or `test` group.
    pub development: Vec<GemDeclaration>,
}

/// The full result of parsing one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ParseOutput {
    /// The package's own name, from a `Gem::Specification`/`Pod::Spec`
    /// constructor, if present.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub self_name: Option<String>,
    /// The package's own version, if present.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub self_version: Option<String>,
    /// Runtime and development dependency declarations, in source order.
    pub groups: Groups,
}
