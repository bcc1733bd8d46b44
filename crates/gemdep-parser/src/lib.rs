//! Lenient recursive-descent parser for Gemfile/Podfile and gemspec/podspec
//! manifests: a Ruby-like DSL subset used to declare dependencies.
//!
//! ```
//! let output = gemdep_parser::parse("gem 'rails', '~> 7.0'\n").unwrap();
//! assert_eq!(output.groups.runtime[0].name, "rails");
//! ```
//!
//! Parsing never panics on malformed input; it recovers past anything it
//! doesn't recognize and only fails for the two conditions in
//! `SPEC_FULL.md` §4.2/§4.3 that have no sensible recovery (a missing name
//! literal, or nesting past the configured cap).

mod normalize;
mod output;
mod parser;

pub use gemdep_error::{GemfileError, Result};
pub use gemdep_token::{Limits, Token, TokenKind};
pub use output::{GemDeclaration, Groups, ParseOutput};

use parser::Parser;

/// Tokenize `source` without parsing it. Exposed for testing and for callers
/// that want the raw token stream.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    gemdep_lexer::tokenize(source)
}

/// Parse `source` using the default safety caps and diagnostic sink.
///
/// Diagnostics (unresolved string interpolation, unresolved `send` dispatch)
/// are emitted at `debug` level via `tracing`; use [`parse_with_sink`] to
/// capture them directly instead.
pub fn parse(source: &str) -> Result<ParseOutput> {
    parse_with_limits(source, Limits::default())
}

/// Parse `source` with caller-supplied safety caps.
pub fn parse_with_limits(source: &str, limits: Limits) -> Result<ParseOutput> {
    let mut sink = tracing_sink();
    parse_with_sink(source, limits, &mut sink)
}

/// Parse `source`, routing diagnostic notes to `sink` instead of `tracing`.
pub fn parse_with_sink(
    source: &str,
    limits: Limits,
    sink: &mut dyn FnMut(&str),
) -> Result<ParseOutput> {
    let tokens = gemdep_lexer::tokenize_with_limits(source, limits)?;
    Parser::new(tokens, limits, sink).parse()
}

fn tracing_sink() -> impl FnMut(&str) {
    |message: &str| {
        tracing::debug!(target: "gemdep_parser", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_runtime_gem() {
        let output = parse("gem 'rails'\n").unwrap();
        assert_eq!(output.groups.runtime.len(), 1);
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.name, "rails");
        assert_eq!(decl.groups, Some(Vec::new()));
        assert!(decl.platforms.is_empty());
        assert!(output.groups.development.is_empty());
    }

    #[test]
    fn podfile_target_block_sets_groups() {
        let source = "platform :ios, '11.0'\ntarget 'HelloCocoaPods' do\n    pod 'Filament'\nend\n";
        let output = parse(source).unwrap();
        assert_eq!(output.groups.runtime.len(), 1);
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.name, "Filament");
        assert_eq!(decl.groups, Some(vec!["HelloCocoaPods".to_string()]));
    }

    #[test]
    fn gemspec_word_array_versions() {
        let source =
            "Gem::Specification.new do |s|\n  s.add_runtime_dependency 'foo', %w[~>1.0 >=1.5]\nend\n";
        let output = parse(source).unwrap();
        assert_eq!(output.groups.development.len(), 0);
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.name, "foo");
        assert_eq!(decl.versions, vec!["~> 1.0".to_string(), ">= 1.5".to_string()]);
        assert_eq!(decl.groups, Some(Vec::new()));
    }

    #[test]
    fn development_group_omits_groups_field() {
        let source = "gem 'byebug', platforms: [:mri, :cygwin, :arm64], group: development\n";
        let output = parse(source).unwrap();
        assert!(output.groups.runtime.is_empty());
        let decl = &output.groups.development[0];
        assert_eq!(decl.name, "byebug");
        assert_eq!(decl.groups, None);
        assert_eq!(
            decl.platforms,
            vec!["mri".to_string(), "cygwin".to_string(), "arm64".to_string()]
        );
    }

    #[test]
    fn nested_group_block_classifies_development() {
        let source = "group :test, :development do\n  gem 'bar', '2.0'\nend\n";
        let output = parse(source).unwrap();
        assert!(output.groups.runtime.is_empty());
        let decl = &output.groups.development[0];
        assert_eq!(decl.name, "bar");
        assert_eq!(decl.versions, vec!["2.0".to_string()]);
        assert_eq!(decl.groups, None);
    }

    #[test]
    fn trailing_conditional_strips_groups_regardless_of_classification() {
        let source = "gem \"couchdb\", \"0.2.2\" if ENV[\"DB\"] == \"all\"\n";
        let output = parse(source).unwrap();
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.name, "couchdb");
        assert_eq!(decl.versions, vec!["0.2.2".to_string()]);
        assert_eq!(decl.groups, None);
    }

    #[test]
    fn spec_nested_quotes_and_percent_literal() {
        let source = "Gem::Specification.new do |s|\n  s.add_dependency '\"\"rails\"\"', \"'>= 6.0'\"\nend\n";
        let output = parse(source).unwrap();
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.name, "rails");
        assert_eq!(decl.versions, vec![">= 6.0".to_string()]);
    }

    #[test]
    fn spec_percent_literal_name_and_version() {
        let source = "Gem::Specification.new do |s|\n  s.add_dependency %q<gemname>, %q<3.0>\nend\n";
        let output = parse(source).unwrap();
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.name, "gemname");
        assert_eq!(decl.versions, vec!["3.0".to_string()]);
    }

    #[test]
    fn plain_dependency_method_always_strips_groups() {
        let source = "Gem::Specification.new do |s|\n  s.dependency 'foo', '1.0'\nend\n";
        let output = parse(source).unwrap();
        let decl = &output.groups.runtime[0];
        assert_eq!(decl.groups, None);
    }

    #[test]
    fn send_indirection_routes_to_development() {
        let source =
            "Gem::Specification.new do |s|\n  s.send(:add_development_dependency, 'rspec', '3.0')\nend\n";
        let output = parse(source).unwrap();
        assert!(output.groups.runtime.is_empty());
        let decl = &output.groups.development[0];
        assert_eq!(decl.name, "rspec");
    }

    #[test]
    fn spec_if_without_else_takes_first_branch() {
        let source = "Gem::Specification.new do |s|\n  if true\n    s.add_dependency 'a', '1.0'\n  end\n  s.add_dependency 'b', '2.0'\nend\n";
        let output = parse(source).unwrap();
        let names: Vec<_> = output.groups.runtime.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn spec_if_else_only_keeps_first_branch() {
        let source = "Gem::Specification.new do |s|\n  if true\n    s.add_dependency 'a', '1.0'\n  else\n    s.add_dependency 'skip_me', '9.9'\n  end\n  s.add_dependency 'b', '2.0'\nend\n";
        let output = parse(source).unwrap();
        let names: Vec<_> = output.groups.runtime.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn self_name_and_version_assignment() {
        let source = "Gem::Specification.new do |s|\n  s.name = 'mygem'\n  s.version = '1.2.3'\nend\n";
        let output = parse(source).unwrap();
        assert_eq!(output.self_name, Some("mygem".to_string()));
        assert_eq!(output.self_version, Some("1.2.3".to_string()));
    }

    #[test]
    fn unknown_statements_are_skipped_not_fatal() {
        let source = "unknown_method :foo, :bar\ngem 'rails'\n";
        let output = parse(source).unwrap();
        assert_eq!(output.groups.runtime.len(), 1);
        assert_eq!(output.groups.runtime[0].name, "rails");
    }

    #[test]
    fn missing_name_literal_is_fatal() {
        let err = parse("gem\n").unwrap_err();
        assert!(err.to_string().contains("name literal expected"));
    }

    #[test]
    fn nesting_too_deep_is_fatal() {
        let limits = Limits { max_nesting: 2, ..Limits::default() };
        let source = "group :a do\n  group :b do\n    group :c do\n      gem 'x'\n    end\n  end\nend\n";
        let err = parse_with_limits(source, limits).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"));
    }

    #[test]
    fn diagnostic_sink_receives_unresolved_interpolation() {
        let mut notes = Vec::new();
        let source = "gem \"rails-\"#{RUBY_VERSION}\"\"\n";
        let _ = parse_with_sink(source, Limits::default(), &mut |msg| notes.push(msg.to_string()));
        assert!(notes.iter().any(|n| n.contains("interpolation")));
    }
}
