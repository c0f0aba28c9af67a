//! Element tree nodes and handles
//!
//! Elements own their children. A [`ElementPath`] addresses an element by the
//! child indices leading to it from the document root.

use std::fmt::{self, Display, Formatter};

/// Attribute as written in the source (qualified name, unescaped value)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name, including any prefix
    pub name: String,
    /// Unescaped value
    pub value: String,
}

/// Any node that can appear inside an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Child element
    Element(Element),
    /// Unescaped character data
    Text(String),
    /// CDATA section content
    CData(String),
    /// Comment content (between `<!--` and `-->`)
    Comment(String),
    /// Processing instruction content (between `<?` and `?>`)
    ProcessingInstruction(String),
    /// Document type declaration content
    DocType(String),
}

impl Node {
    /// Element inside this node, if any
    #[inline]
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable element inside this node, if any
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Check if this is a text node made only of whitespace
    #[inline]
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Self::Text(t) if t.chars().all(char::is_whitespace))
    }
}

/// XML element with resolved namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Create element without a namespace
    ///
    /// Elements pushed into a parent through [`Element::push_element`]
    /// inherit the parent's namespace when they have none.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create element in a namespace
    #[inline]
    #[must_use]
    pub fn new_in(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            ..Self::new(name)
        }
    }

    /// With attribute (builder form of [`Element::set_attribute`])
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// With text content
    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub(crate) fn from_parts(name: String, namespace: Option<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            name,
            namespace,
            attributes,
            children: Vec::new(),
        }
    }

    /// Qualified name as written
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without prefix
    #[inline]
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Prefix of the qualified name, if any
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Resolved namespace URI
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// All attributes in source order
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute value by qualified name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set or replace attribute value, keeping its position
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Remove attribute, returning its value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(idx).value)
    }

    /// All child nodes
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub(crate) fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Child elements with their index in [`Element::children`]
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_element().map(|e| (i, e)))
    }

    /// Mutable child elements
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First child element with the given local name
    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.elements()
            .map(|(_, e)| e)
            .find(|e| e.local_name() == local_name)
    }

    /// Mutable first child element with the given local name
    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|e| e.local_name() == local_name)
    }

    /// Child element at index in [`Element::children`]
    #[inline]
    #[must_use]
    pub fn child_at(&self, index: usize) -> Option<&Element> {
        self.children.get(index).and_then(Node::as_element)
    }

    /// Mutable child element at index in [`Element::children`]
    #[inline]
    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.children.get_mut(index).and_then(Node::as_element_mut)
    }

    /// Concatenated text and CDATA content of direct children
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Text of the first child element with the given local name
    #[must_use]
    pub fn child_text(&self, local_name: &str) -> Option<String> {
        self.child(local_name).map(Element::text)
    }

    /// Set text of a child element, creating the child if missing
    pub fn set_child_text(&mut self, local_name: &str, text: impl Into<String>) {
        if let Some(child) = self.child_mut(local_name) {
            child.set_text(text);
            return;
        }
        let child = Element::new(local_name).with_text(text);
        self.push_element(child);
    }

    /// Append a child element, copying the indentation used by its siblings
    ///
    /// A child without a namespace inherits this element's namespace.
    ///
    /// # Returns
    /// Index of the new child in [`Element::children`]
    pub fn push_element(&mut self, mut child: Element) -> usize {
        if child.namespace.is_none() && child.prefix().is_none() {
            child.namespace.clone_from(&self.namespace);
        }

        let last_element = self.children.iter().rposition(|n| n.as_element().is_some());
        let Some(last) = last_element else {
            self.children.push(Node::Element(child));
            return self.children.len() - 1;
        };

        let indent = last
            .checked_sub(1)
            .and_then(|i| self.children.get(i))
            .filter(|n| n.is_whitespace())
            .cloned();
        let closing = self.children.len() > last + 1 && self.children[self.children.len() - 1].is_whitespace();

        let mut at = if closing { self.children.len() - 1 } else { self.children.len() };
        if let Some(indent) = indent {
            self.children.insert(at, indent);
            at += 1;
        }
        self.children.insert(at, Node::Element(child));
        at
    }

    /// Remove the child node at index together with its leading whitespace
    pub fn remove_child(&mut self, index: usize) -> Option<Node> {
        if index >= self.children.len() {
            return None;
        }
        let node = self.children.remove(index);
        if index > 0 && self.children[index - 1].is_whitespace() {
            self.children.remove(index - 1);
        }
        Some(node)
    }

    /// Remove every child element for which `keep` returns false
    ///
    /// # Returns
    /// Number of removed elements
    pub fn retain_elements<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let doomed: Vec<usize> = self
            .elements()
            .filter(|(_, e)| !keep(e))
            .map(|(i, _)| i)
            .collect();
        for &idx in doomed.iter().rev() {
            self.remove_child(idx);
        }
        doomed.len()
    }
}

/// Handle to an element: child indices from the root element
///
/// An empty path addresses the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPath(Vec<usize>);

impl ElementPath {
    /// Path of the root element
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of a child of this element
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Child indices from the root
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl Display for ElementPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for idx in &self.0 {
            write!(f, "/{idx}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with_items() -> Element {
        let mut group = Element::new_in("ItemGroup", Some("urn:test"));
        group.push_node(Node::Text("\n    ".into()));
        group.push_node(Node::Element(Element::new("Compile").with_attribute("Include", "A.cs")));
        group.push_node(Node::Text("\n    ".into()));
        group.push_node(Node::Element(Element::new("Compile").with_attribute("Include", "B.cs")));
        group.push_node(Node::Text("\n  ".into()));
        group
    }

    #[test]
    fn local_name_and_prefix() {
        let e = Element::new("x:Item");
        assert_eq!(e.local_name(), "Item");
        assert_eq!(e.prefix(), Some("x"));

        let e = Element::new("Item");
        assert_eq!(e.local_name(), "Item");
        assert_eq!(e.prefix(), None);
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut e = Element::new("Compile")
            .with_attribute("Include", "A.cs")
            .with_attribute("Condition", "x");
        e.set_attribute("Include", "B.cs");

        assert_eq!(e.attributes()[0].name, "Include");
        assert_eq!(e.attribute("Include"), Some("B.cs"));
        assert_eq!(e.remove_attribute("Condition").as_deref(), Some("x"));
        assert!(e.attribute("Condition").is_none());
    }

    #[test]
    fn push_element_copies_indentation_and_namespace() {
        let mut group = group_with_items();
        let idx = group.push_element(Element::new("Compile").with_attribute("Include", "C.cs"));

        assert_eq!(group.children()[idx - 1], Node::Text("\n    ".into()));
        assert_eq!(group.children().last(), Some(&Node::Text("\n  ".into())));
        let added = group.child_at(idx).unwrap();
        assert_eq!(added.namespace(), Some("urn:test"));
        assert_eq!(added.attribute("Include"), Some("C.cs"));
    }

    #[test]
    fn push_element_into_empty_element() {
        let mut group = Element::new("ItemGroup");
        let idx = group.push_element(Element::new("None"));
        assert_eq!(idx, 0);
        assert_eq!(group.children().len(), 1);
    }

    #[test]
    fn remove_child_takes_leading_whitespace() {
        let mut group = group_with_items();
        let before = group.children().len();
        group.remove_child(1);

        assert_eq!(group.children().len(), before - 2);
        assert_eq!(group.elements().count(), 1);
        assert_eq!(group.elements().next().unwrap().1.attribute("Include"), Some("B.cs"));
    }

    #[test]
    fn retain_elements_counts_removed() {
        let mut group = group_with_items();
        let removed = group.retain_elements(|e| e.attribute("Include") != Some("A.cs"));
        assert_eq!(removed, 1);
        assert_eq!(group.elements().count(), 1);
    }

    #[test]
    fn set_child_text_creates_or_updates() {
        let mut reference = Element::new("Reference").with_attribute("Include", "VRage");
        reference.set_child_text("HintPath", r"C:\Bin\VRage.dll");
        assert_eq!(reference.child_text("HintPath").as_deref(), Some(r"C:\Bin\VRage.dll"));

        reference.set_child_text("HintPath", r"D:\Bin\VRage.dll");
        assert_eq!(reference.elements().count(), 1);
        assert_eq!(reference.child_text("HintPath").as_deref(), Some(r"D:\Bin\VRage.dll"));
    }

    #[test]
    fn element_path_display() {
        assert_eq!(ElementPath::root().to_string(), "/");
        assert_eq!(ElementPath::root().child(3).child(1).to_string(), "/3/1");
    }
}
