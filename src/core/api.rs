//! Purpose: Model, validate, and query the plugin API descriptor document.
//! Exports: `ApiDocument`, `FunctionDescriptor`, `ArgumentDescriptor`.
//! Role: Contract between a plugin's `plugin_api` text and the host-side registry.
//! Invariants: Function order is preserved exactly as declared.
//! Invariants: A document that passes `validate` has unique function names, unique
//! argument names per function, and no `void` arguments.
//! Invariants: `arguments` and `varargs: true` are mutually exclusive.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::types::ClType;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiDocument {
    #[serde(rename = "API")]
    pub functions: Vec<FunctionDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub return_type: ClType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<ArgumentDescriptor>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub varargs: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ClType,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, return_type: ClType) -> Self {
        Self {
            name: name.into(),
            return_type,
            arguments: None,
            varargs: false,
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, ty: ClType) -> Self {
        self.arguments
            .get_or_insert_with(Vec::new)
            .push(ArgumentDescriptor {
                name: name.into(),
                ty,
            });
        self
    }

    pub fn variadic(mut self) -> Self {
        self.varargs = true;
        self
    }
}

impl ApiDocument {
    pub fn new(functions: Vec<FunctionDescriptor>) -> Self {
        Self { functions }
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        let document: ApiDocument = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("invalid api descriptor")
                .with_source(err)
        })?;
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for function in &self.functions {
            let invalid = |message: &str| {
                Error::new(ErrorKind::Usage)
                    .with_message(message.to_string())
                    .with_function(function.name.clone())
            };
            if function.name.is_empty() {
                return Err(Error::new(ErrorKind::Usage).with_message("function name is empty"));
            }
            if !seen.insert(function.name.as_str()) {
                return Err(invalid("duplicate function name"));
            }
            if !function.return_type.is_return_type() {
                return Err(invalid("return type not allowed"));
            }
            let Some(arguments) = &function.arguments else {
                continue;
            };
            if function.varargs {
                return Err(invalid("arguments and varargs are mutually exclusive"));
            }
            let mut names = HashSet::new();
            for argument in arguments {
                if argument.name.is_empty() {
                    return Err(invalid("argument name is empty"));
                }
                if !names.insert(argument.name.as_str()) {
                    return Err(invalid("duplicate argument name").with_argument(&argument.name));
                }
                if !argument.ty.is_argument_type() {
                    return Err(invalid("argument type not allowed").with_argument(&argument.name));
                }
            }
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions
            .iter()
            .map(|function| function.name.as_str())
            .collect()
    }

    pub fn return_type(&self, name: &str) -> Result<ClType, Error> {
        self.require(name).map(|function| function.return_type)
    }

    pub fn argument_type(&self, name: &str, argument: &str) -> Result<ClType, Error> {
        let function = self.require(name)?;
        function
            .arguments
            .iter()
            .flatten()
            .find(|candidate| candidate.name == argument)
            .map(|candidate| candidate.ty)
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("argument not declared")
                    .with_function(name)
                    .with_argument(argument)
            })
    }

    /// Arguments of `name` as `"arg_name,type"` entries, in declaration order.
    pub fn argument_list(&self, name: &str) -> Result<Vec<String>, Error> {
        let function = self.require(name)?;
        Ok(function
            .arguments
            .iter()
            .flatten()
            .map(|argument| format!("{},{}", argument.name, argument.ty))
            .collect())
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, Error> {
        let result = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        result.map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to serialize api descriptor")
                .with_source(err)
        })
    }

    fn require(&self, name: &str) -> Result<&FunctionDescriptor, Error> {
        self.function(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("function not declared")
                .with_function(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiDocument, FunctionDescriptor};
    use crate::core::error::ErrorKind;
    use crate::core::types::ClType;

    const SAMPLE: &str = r#"{"API": [
        { "name": "foo_int", "return_type": "int" },
        { "name": "foo_args", "return_type": "void", "arguments": [
            { "name": "arg1", "type": "int" },
            { "name": "arg14", "type": "string" }
        ] },
        { "name": "foo_var", "return_type": "boolean", "varargs": true }
    ]}"#;

    #[test]
    fn parses_functions_in_declaration_order() {
        let api = ApiDocument::parse(SAMPLE).expect("parse");
        assert_eq!(api.function_names(), vec!["foo_int", "foo_args", "foo_var"]);
        assert_eq!(api.return_type("foo_int").unwrap(), ClType::Int);
        assert_eq!(api.argument_type("foo_args", "arg14").unwrap(), ClType::String);
        assert!(api.function("foo_var").unwrap().varargs);
    }

    #[test]
    fn argument_list_uses_name_comma_type() {
        let api = ApiDocument::parse(SAMPLE).expect("parse");
        assert_eq!(
            api.argument_list("foo_args").unwrap(),
            vec!["arg1,int".to_string(), "arg14,string".to_string()]
        );
        assert!(api.argument_list("foo_int").unwrap().is_empty());
        let err = api.argument_list("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unknown_type_names_fail_to_decode() {
        let err = ApiDocument::parse(r#"{"API":[{"name":"f","return_type":"quad"}]}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        let err = ApiDocument::parse("not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn validation_rejects_inconsistent_documents() {
        let duplicate = ApiDocument::new(vec![
            FunctionDescriptor::new("f", ClType::Int),
            FunctionDescriptor::new("f", ClType::Void),
        ]);
        assert_eq!(duplicate.validate().unwrap_err().kind(), ErrorKind::Usage);

        let void_argument = ApiDocument::new(vec![
            FunctionDescriptor::new("f", ClType::Int).with_argument("a", ClType::Void),
        ]);
        let err = void_argument.validate().unwrap_err();
        assert_eq!(err.argument(), Some("a"));

        let both = ApiDocument::new(vec![
            FunctionDescriptor::new("f", ClType::Int)
                .with_argument("a", ClType::Int)
                .variadic(),
        ]);
        assert_eq!(both.validate().unwrap_err().kind(), ErrorKind::Usage);

        let pointer_return = ApiDocument::new(vec![FunctionDescriptor::new("f", ClType::Pointer)]);
        assert_eq!(pointer_return.validate().unwrap_err().function(), Some("f"));
    }

    #[test]
    fn string_is_a_valid_return_type() {
        let api = ApiDocument::parse(r#"{"API":[{"name":"foo_string","return_type":"string"}]}"#)
            .expect("parse");
        assert_eq!(api.return_type("foo_string").unwrap(), ClType::String);
        assert!(api.argument_list("foo_string").unwrap().is_empty());
    }

    #[test]
    fn renders_back_to_equivalent_json() {
        let api = ApiDocument::parse(SAMPLE).expect("parse");
        let text = api.to_json(false).expect("render");
        assert!(text.starts_with(r#"{"API":["#));
        assert!(!text.contains("varargs\":false"));
        assert_eq!(ApiDocument::parse(&text).unwrap(), api);
    }
}
