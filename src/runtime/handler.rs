//! Handler metadata: declarations, methods and signature-checked lookup.
//!
//! A module declares update handlers with entries named
//! [`UPDATE_HANDLER_DECLARATION`]; each entry names a handler type. The agent
//! then looks for two hooks on that type, [`CLEAR_CACHE`] and
//! [`UPDATE_APPLICATION`], and only accepts them with the hook shape
//! `static fn(updated_types: &[TypeRef])` returning nothing.

use std::fmt;
use std::sync::Arc;

use crate::core::TypeRef;

/// Declaration name that marks an update handler.
///
/// Matched by name, so a library can declare its own copy of the marker.
pub const UPDATE_HANDLER_DECLARATION: &str = "MetadataUpdateHandler";

/// Hook run in the first pass, before any application update.
pub const CLEAR_CACHE: &str = "ClearCache";

/// Hook run in the second pass.
pub const UPDATE_APPLICATION: &str = "UpdateApplication";

/// Callable body of a handler hook.
pub type HandlerFn = Arc<dyn Fn(&[TypeRef]) -> anyhow::Result<()> + Send + Sync>;

// =============================================================================
// Declarations
// =============================================================================

/// Name of a handler type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerType(Arc<str>);

impl HandlerType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One constructor-style argument of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationArg {
    /// A type reference.
    Type(HandlerType),
    /// Any other literal.
    Value(String),
}

/// A declaration attached to a module, e.g. `MetadataUpdateHandler(MyCache)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDeclaration {
    pub name: String,
    pub args: Vec<DeclarationArg>,
}

impl HandlerDeclaration {
    pub fn new(name: impl Into<String>, args: Vec<DeclarationArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Well-formed update handler declaration for `handler`.
    pub fn update_handler(handler: impl Into<Arc<str>>) -> Self {
        Self::new(
            UPDATE_HANDLER_DECLARATION,
            vec![DeclarationArg::Type(HandlerType::new(handler))],
        )
    }

    #[inline]
    pub fn is_update_handler(&self) -> bool {
        self.name == UPDATE_HANDLER_DECLARATION
    }

    /// The handler type, if the declaration has exactly one type argument.
    pub fn handler_type(&self) -> Option<&HandlerType> {
        match self.args.as_slice() {
            [DeclarationArg::Type(ty)] => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for HandlerDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                DeclarationArg::Type(ty) => write!(f, "typeof({ty})")?,
                DeclarationArg::Value(v) => write!(f, "{v:?}")?,
            }
        }
        f.write_str(")")
    }
}

// =============================================================================
// Methods
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    Static,
    Instance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Sequence of updated types (may be empty).
    UpdatedTypes,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Unit,
    Other(String),
}

/// Declared shape of a handler method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub receiver: Receiver,
    pub params: Vec<ParamType>,
    pub returns: ReturnType,
}

impl MethodSignature {
    /// The only shape the agent invokes.
    pub fn update_hook() -> Self {
        Self {
            receiver: Receiver::Static,
            params: vec![ParamType::UpdatedTypes],
            returns: ReturnType::Unit,
        }
    }

    pub fn is_update_hook(&self) -> bool {
        self.receiver == Receiver::Static
            && matches!(self.params.as_slice(), [ParamType::UpdatedTypes])
            && self.returns == ReturnType::Unit
    }
}

/// A method found on a handler type.
#[derive(Clone)]
pub struct HandlerMethod {
    pub name: String,
    pub signature: MethodSignature,
    body: HandlerFn,
}

impl HandlerMethod {
    /// Method with the hook signature.
    pub fn hook<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[TypeRef]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: MethodSignature::update_hook(),
            body: Arc::new(body),
        }
    }

    /// Method with an arbitrary declared shape and an empty body.
    pub fn with_signature(name: impl Into<String>, signature: MethodSignature) -> Self {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(|_: &[TypeRef]| -> anyhow::Result<()> { Ok(()) }),
        }
    }

    #[inline]
    pub fn body(&self) -> &HandlerFn {
        &self.body
    }
}

impl fmt::Debug for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = &self.signature;
        if sig.receiver == Receiver::Static {
            f.write_str("static ")?;
        }
        match &sig.returns {
            ReturnType::Unit => f.write_str("void ")?,
            ReturnType::Other(ty) => write!(f, "{ty} ")?,
        }
        write!(f, "{}(", self.name)?;
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match param {
                ParamType::UpdatedTypes => f.write_str("Type[]")?,
                ParamType::Other(ty) => f.write_str(ty)?,
            }
        }
        f.write_str(")")
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Result of looking up a hook by name.
#[derive(Debug)]
pub enum MethodLookup<'a> {
    /// A method with the hook signature.
    Found(&'a HandlerMethod),
    /// Methods with that name exist but none has the hook signature; holds the first.
    Mismatch(&'a HandlerMethod),
    Missing,
}

/// Signature-checked lookup of hook `name` among `methods`.
///
/// A valid overload wins over mismatched ones regardless of order.
pub fn resolve_handler_method<'a>(methods: &'a [HandlerMethod], name: &str) -> MethodLookup<'a> {
    if let Some(method) = methods
        .iter()
        .find(|m| m.name == name && m.signature.is_update_hook())
    {
        return MethodLookup::Found(method);
    }

    match methods.iter().find(|m| m.name == name) {
        Some(method) => MethodLookup::Mismatch(method),
        None => MethodLookup::Missing,
    }
}

// =============================================================================
// Tests
// =============================================================================
