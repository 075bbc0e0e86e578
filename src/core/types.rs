//! Type tokens and resolved type references.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ModuleId;

/// Metadata token naming a type inside one module build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeToken(pub i32);

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<i32> for TypeToken {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// An updated type as handed to update handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub module: ModuleId,
    pub token: TypeToken,
    pub name: Arc<str>,
}

impl TypeRef {
    pub fn new(module: ModuleId, token: impl Into<TypeToken>, name: impl Into<Arc<str>>) -> Self {
        Self {
            module,
            token: token.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display_is_hex() {
        assert_eq!(TypeToken(0x0200_0002).to_string(), "0x02000002");
    }

    #[test]
    fn test_type_ref_display_is_name() {
        let ty = TypeRef::new(ModuleId::from_u128(1), 42, "App.Counter");
        assert_eq!(ty.to_string(), "App.Counter");
        assert_eq!(ty.token, TypeToken(42));
    }
}
