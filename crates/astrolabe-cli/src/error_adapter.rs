//! Error adapter for converting [`CliError`] to miette diagnostics.
//!
//! Input errors carry the source text and the span reported by the TOML
//! parser, so they render with a labelled snippet. Every other variant renders
//! as a plain message with an error code.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use crate::error::CliError;

/// Adapter for a graph file that failed to parse.
pub struct InputAdapter<'a> {
    path: &'a str,
    src: &'a str,
    err: &'a toml::de::Error,
}

impl fmt::Debug for InputAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputAdapter")
            .field("path", &self.path)
            .field("err", &self.err)
            .finish()
    }
}

impl fmt::Display for InputAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid graph file '{}'", self.path)
    }
}

impl std::error::Error for InputAdapter<'_> {}

impl MietteDiagnostic for InputAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("astrolabe::input"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(
            "graph files list [[nodes]], [[edges]], [[regions]] and [[connections]] tables",
        ))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.err.span()?;
        let span = SourceSpan::new(span.start.into(), span.len());
        Some(Box::new(std::iter::once(LabeledSpan::new_primary_with_span(
            Some(self.err.message().to_string()),
            span,
        ))))
    }
}

/// Adapter for [`CliError`] variants without source information.
pub struct ErrorAdapter<'a>(pub &'a CliError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            CliError::Io(_) => "astrolabe::io",
            CliError::Config(_) => "astrolabe::config",
            CliError::Input { .. } => "astrolabe::input",
            CliError::Invalid(_) => "astrolabe::invalid",
            CliError::Graph(_) => "astrolabe::graph",
            CliError::Layout(_) => "astrolabe::layout",
            CliError::Output(_) => "astrolabe::output",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            CliError::Layout(astrolabe::LayoutError::UnknownLayout(_)) => {
                "known layouts: grid, circular, spherical, radial, treemap, force, hierarchical, constraint, nested, adaptive"
            }
            CliError::Config(_) => "pass --config or remove the broken configuration file",
            _ => return None,
        };
        Some(Box::new(help))
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A graph file error with source location information.
    Input(InputAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Input(i) => fmt::Display::fmt(i, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Input(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Input(i) => i.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Input(i) => i.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Input(i) => i.source_code(),
            Reportable::Error(_) => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Input(i) => i.labels(),
            Reportable::Error(_) => None,
        }
    }
}

/// Convert a [`CliError`] into a reportable error.
pub fn to_reportable(err: &CliError) -> Reportable<'_> {
    match err {
        CliError::Input { path, src, err } => Reportable::Input(InputAdapter { path, src, err }),
        _ => Reportable::Error(ErrorAdapter(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_error(src: &str) -> CliError {
        let err = toml::from_str::<toml::Table>(src).unwrap_err();
        CliError::Input {
            path: "graph.toml".to_string(),
            src: src.to_string(),
            err,
        }
    }

    #[test]
    fn test_input_error_carries_a_label() {
        let err = input_error("[[nodes]]\nid = \n");
        let reportable = to_reportable(&err);

        assert!(matches!(reportable, Reportable::Input(_)));
        assert_eq!(reportable.to_string(), "invalid graph file 'graph.toml'");
        assert!(reportable.source_code().is_some());
        assert_eq!(reportable.labels().unwrap().count(), 1);
    }

    #[test]
    fn test_plain_error_has_code() {
        let err = CliError::Invalid("edge references nothing".to_string());
        let reportable = to_reportable(&err);

        match &reportable {
            Reportable::Error(e) => {
                assert_eq!(e.to_string(), "invalid graph: edge references nothing");
            }
            Reportable::Input(_) => panic!("Expected Error"),
        }
        assert_eq!(reportable.code().unwrap().to_string(), "astrolabe::invalid");
        assert!(reportable.labels().is_none());
    }

    #[test]
    fn test_unknown_layout_has_help() {
        let err = CliError::Layout(astrolabe::LayoutError::UnknownLayout("spiral".to_string()));
        let reportable = to_reportable(&err);
        assert!(reportable.help().unwrap().to_string().contains("hierarchical"));
    }
}
