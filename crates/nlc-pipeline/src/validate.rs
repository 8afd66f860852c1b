//! Command validation against the intent's parameter schema.

use std::fmt;

use nlc_protocol::{ErrorKind, Intent, ParamKind, ParamValue, ParameterSet};

use crate::catalog::{IntentCatalog, ParamSpec};

/// Result of validating one parameter set.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    MissingParameter(String),
    OutOfRange { name: String, value: String },
    TypeMismatch(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Error kind for a failed outcome.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Valid => None,
            Self::MissingParameter(_) => Some(ErrorKind::MissingParameter),
            Self::OutOfRange { .. } => Some(ErrorKind::OutOfRangeParameter),
            Self::TypeMismatch(_) => Some(ErrorKind::TypeMismatchParameter),
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::MissingParameter(name) => write!(f, "missing required parameter '{name}'"),
            Self::OutOfRange { name, value } => {
                write!(f, "parameter '{name}' out of range: {value}")
            }
            Self::TypeMismatch(name) => write!(f, "parameter '{name}' has the wrong type"),
        }
    }
}

/// Pure, stateless validator over an intent catalog.
pub struct CommandValidator<'a> {
    catalog: &'a IntentCatalog,
}

impl<'a> CommandValidator<'a> {
    pub fn new(catalog: &'a IntentCatalog) -> Self {
        Self { catalog }
    }

    /// Check `parameters` against the schema of `intent`.
    ///
    /// Present parameters are checked in schema order (kind, then range),
    /// then required parameters for presence. Intents without a schema
    /// entry have nothing to check.
    pub fn validate(&self, intent: &Intent, parameters: &ParameterSet) -> ValidationOutcome {
        let Some(spec) = self.catalog.get(&intent.name) else {
            return ValidationOutcome::Valid;
        };

        for param in &spec.params {
            if let Some(value) = parameters.get(param.name) {
                let outcome = check_value(param, value);
                if !outcome.is_valid() {
                    return outcome;
                }
            }
        }

        spec.params
            .iter()
            .find(|p| p.required && !parameters.contains(p.name))
            .map_or(ValidationOutcome::Valid, |p| {
                ValidationOutcome::MissingParameter(p.name.to_string())
            })
    }
}

fn check_value(param: &ParamSpec, value: &ParamValue) -> ValidationOutcome {
    if value.kind() != param.kind {
        return ValidationOutcome::TypeMismatch(param.name.to_string());
    }

    let out_of_range = || ValidationOutcome::OutOfRange {
        name: param.name.to_string(),
        value: value.to_string(),
    };

    match value {
        ParamValue::Number(n) if !n.is_finite() || !param.contains(*n) => out_of_range(),
        ParamValue::Vector(v) if v.iter().any(|c| !c.is_finite() || !param.contains(*c)) => {
            out_of_range()
        }
        ParamValue::Grid { rows, cols }
            if *rows == 0
                || *cols == 0
                || !param.contains(f64::from(*rows))
                || !param.contains(f64::from(*cols)) =>
        {
            out_of_range()
        }
        ParamValue::Text(t) if t.trim().is_empty() && param.kind == ParamKind::Text => {
            ValidationOutcome::MissingParameter(param.name.to_string())
        }
        _ => ValidationOutcome::Valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlc_protocol::{EntityRef, Reference};

    fn intent(catalog: &IntentCatalog, name: &str) -> Intent {
        catalog.get(name).unwrap().intent(0.95)
    }

    #[test]
    fn valid_sphere() {
        let catalog = IntentCatalog::cad();
        let params: ParameterSet = [
            ("radius".to_string(), ParamValue::Number(5.0)),
            ("color".to_string(), ParamValue::Color("red".into())),
        ]
        .into_iter()
        .collect();
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "CreateSphere"), &params);
        assert_eq!(outcome, ValidationOutcome::Valid);
        assert!(outcome.error_kind().is_none());
    }

    #[test]
    fn missing_required_parameter() {
        let catalog = IntentCatalog::cad();
        let outcome = CommandValidator::new(&catalog)
            .validate(&intent(&catalog, "CreateSphere"), &ParameterSet::new());
        assert_eq!(outcome, ValidationOutcome::MissingParameter("radius".into()));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::MissingParameter));
    }

    #[test]
    fn negative_radius_out_of_range() {
        let catalog = IntentCatalog::cad();
        let mut params = ParameterSet::new();
        params.insert("radius", ParamValue::Number(-2.0));
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "CreateSphere"), &params);
        assert!(matches!(outcome, ValidationOutcome::OutOfRange { ref name, .. } if name == "radius"));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::OutOfRangeParameter));
    }

    #[test]
    fn vector_components_checked() {
        let catalog = IntentCatalog::cad();
        let mut params = ParameterSet::new();
        params.insert("radius", ParamValue::Number(1.0));
        params.insert("center", ParamValue::Vector([0.0, 5000.0, 0.0]));
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "CreateSphere"), &params);
        assert_eq!(
            outcome,
            ValidationOutcome::OutOfRange {
                name: "center".into(),
                value: "(0, 5000, 0)".into()
            }
        );
    }

    #[test]
    fn grid_sides_checked() {
        let catalog = IntentCatalog::cad();
        let mut params = ParameterSet::new();
        params.insert("grid", ParamValue::Grid { rows: 0, cols: 3 });
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "ArrayObjects"), &params);
        assert!(matches!(outcome, ValidationOutcome::OutOfRange { .. }));

        params.insert("grid", ParamValue::Grid { rows: 3, cols: 4 });
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "ArrayObjects"), &params);
        assert!(outcome.is_valid());
    }

    #[test]
    fn wrong_kind_is_type_mismatch() {
        let catalog = IntentCatalog::cad();
        let mut params = ParameterSet::new();
        params.insert("radius", ParamValue::Text("big".into()));
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "CreateSphere"), &params);
        assert_eq!(outcome, ValidationOutcome::TypeMismatch("radius".into()));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::TypeMismatchParameter));
    }

    #[test]
    fn type_checked_before_presence() {
        let catalog = IntentCatalog::cad();
        let mut params = ParameterSet::new();
        params.insert("color", ParamValue::Number(3.0));
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "CreateSphere"), &params);
        assert_eq!(outcome, ValidationOutcome::TypeMismatch("color".into()));
    }

    #[test]
    fn resolved_reference_is_valid() {
        let catalog = IntentCatalog::cad();
        let mut params = ParameterSet::new();
        params.insert(
            "target",
            ParamValue::Reference(Reference {
                token: "it".into(),
                resolved: Some(EntityRef::single("obj-1", "sphere")),
            }),
        );
        let outcome = CommandValidator::new(&catalog).validate(&intent(&catalog, "DeleteObject"), &params);
        assert!(outcome.is_valid());
    }

    #[test]
    fn intents_without_parameters_are_valid() {
        let catalog = IntentCatalog::cad();
        let outcome = CommandValidator::new(&catalog)
            .validate(&intent(&catalog, "AnalyzeScene"), &ParameterSet::new());
        assert!(outcome.is_valid());
    }
}
