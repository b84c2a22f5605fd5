//! Location-path types.

/// How a path step selects nodes relative to the node it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Named child step: `name`, `name[key=value]`
    Child,
    /// Current node: `.`
    SelfNode,
    /// Parent node: `..`
    Parent,
    /// Tree root: leading `/`
    FromRoot,
    /// All immediate children: `*`
    AllChildren,
    /// Self and all descendants: `...`, `//`
    AllDescendants,
}

impl StepKind {
    /// Classify a raw step name against the reserved tokens.
    pub fn from_name(name: &str) -> Self {
        match name {
            "." => StepKind::SelfNode,
            ".." => StepKind::Parent,
            "*" => StepKind::AllChildren,
            "..." => StepKind::AllDescendants,
            _ => StepKind::Child,
        }
    }
}

/// One `/`-delimited segment of a parsed location path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    /// Raw step name, possibly module-qualified (`mod:name`).
    pub name: String,
    pub kind: StepKind,
    /// Bracketed predicate strings without the outer brackets, in source order.
    pub predicates: Vec<String>,
    /// Literal value from a trailing unbracketed `=value`.
    pub value: Option<String>,
}

impl PathStep {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            predicates: Vec::new(),
            value: None,
        }
    }

    /// A named child step.
    pub fn child(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::Child)
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Name without the module prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}
