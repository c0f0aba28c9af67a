//! Document parsing and serialization
//!
//! Parsing is event driven through `quick-xml`; the tree keeps whitespace,
//! comments and processing instructions so untouched regions are written
//! back as they were read.

use crate::element::{Attribute, Element, ElementPath, Node};
use crate::error::{XmlError, XmlResult};
use quick_xml::escape::{minimal_escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

const BOM: char = '\u{feff}';

/// XML declaration (`<?xml ...?>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// XML version, usually `1.0`
    pub version: String,
    /// Declared encoding
    pub encoding: Option<String>,
    /// Standalone flag as written
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("utf-8".to_string()),
            standalone: None,
        }
    }
}

/// Parsed XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    bom: bool,
    declaration: Option<Declaration>,
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// Create document around a root element
    #[inline]
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self {
            bom: false,
            declaration: Some(Declaration::default()),
            prolog: vec![Node::Text("\n".to_string())],
            root,
            epilog: Vec::new(),
        }
    }

    /// Parse document from a string
    ///
    /// # Errors
    /// - `XmlError::Malformed` if the input is not well-formed
    /// - `XmlError::MissingRoot` / `XmlError::MultipleRoots` for bad structure
    pub fn parse(content: &str) -> XmlResult<Self> {
        let (content, bom) = match content.strip_prefix(BOM) {
            Some(rest) => (rest, true),
            None => (content, false),
        };

        let mut reader = Reader::from_str(content);
        let mut builder = TreeBuilder::default();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::malformed(reader.buffer_position() as u64, e))?;
            let position = reader.buffer_position() as u64;
            match event {
                Event::Decl(decl) => {
                    let version = decl
                        .version()
                        .map_err(|e| XmlError::malformed(position, e))?;
                    let encoding = decl
                        .encoding()
                        .transpose()
                        .map_err(|e| XmlError::malformed(position, e))?;
                    let standalone = decl
                        .standalone()
                        .transpose()
                        .map_err(|e| XmlError::malformed(position, e))?;
                    builder.declaration = Some(Declaration {
                        version: utf8(&version, position)?,
                        encoding: encoding.map(|e| utf8(&e, position)).transpose()?,
                        standalone: standalone.map(|s| utf8(&s, position)).transpose()?,
                    });
                }
                Event::Start(start) => {
                    let element = builder.open(&start, position)?;
                    builder.stack.push(element);
                }
                Event::Empty(start) => {
                    let element = builder.open(&start, position)?;
                    builder.scopes.pop();
                    builder.attach(Node::Element(element))?;
                }
                Event::End(end) => {
                    let name = utf8(end.name().as_ref(), position)?;
                    let element = builder
                        .stack
                        .pop()
                        .ok_or_else(|| XmlError::UnexpectedEnd(name))?;
                    builder.scopes.pop();
                    builder.attach(Node::Element(element))?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| XmlError::malformed(position, e))?;
                    builder.attach(Node::Text(text.into_owned()))?;
                }
                Event::CData(data) => {
                    builder.attach(Node::CData(utf8(&data, position)?))?;
                }
                Event::Comment(comment) => {
                    builder.attach(Node::Comment(utf8(&comment, position)?))?;
                }
                Event::PI(pi) => {
                    builder.attach(Node::ProcessingInstruction(utf8(&pi, position)?))?;
                }
                Event::DocType(doctype) => {
                    builder.attach(Node::DocType(utf8(&doctype, position)?))?;
                }
                Event::Eof => break,
            }
        }

        if let Some(open) = builder.stack.last() {
            return Err(XmlError::malformed(
                content.len() as u64,
                format!("unclosed element '{}'", open.name()),
            ));
        }

        Ok(Self {
            bom,
            declaration: builder.declaration,
            prolog: builder.prolog,
            root: builder.root.ok_or(XmlError::MissingRoot)?,
            epilog: builder.epilog,
        })
    }

    /// Load and parse document from a file
    ///
    /// # Errors
    /// - `XmlError::Io` if the file cannot be read
    /// - Any parse error from [`Document::parse`]
    pub fn load(path: impl AsRef<Path>) -> XmlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| XmlError::io_error(path, e))?;
        Self::parse(&content)
    }

    /// Write document to a file, replacing it
    ///
    /// # Errors
    /// - `XmlError::Io` if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> XmlResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_string()).map_err(|e| XmlError::io_error(path, e))
    }

    /// Root element
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable root element
    #[inline]
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// XML declaration, if present
    #[inline]
    #[must_use]
    pub fn declaration(&self) -> Option<&Declaration> {
        self.declaration.as_ref()
    }

    /// Resolve an element handle
    #[must_use]
    pub fn element(&self, path: &ElementPath) -> Option<&Element> {
        path.indices()
            .iter()
            .try_fold(&self.root, |el, &idx| el.child_at(idx))
    }

    /// Resolve an element handle mutably
    pub fn element_mut(&mut self, path: &ElementPath) -> Option<&mut Element> {
        path.indices()
            .iter()
            .try_fold(&mut self.root, |el, &idx| el.child_at_mut(idx))
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.bom {
            write!(f, "{BOM}")?;
        }
        if let Some(decl) = &self.declaration {
            write!(f, "<?xml version=\"{}\"", decl.version)?;
            if let Some(encoding) = &decl.encoding {
                write!(f, " encoding=\"{encoding}\"")?;
            }
            if let Some(standalone) = &decl.standalone {
                write!(f, " standalone=\"{standalone}\"")?;
            }
            f.write_str("?>")?;
        }
        for node in &self.prolog {
            write_node(f, node, None)?;
        }
        write_element(f, &self.root, None)?;
        for node in &self.epilog {
            write_node(f, node, None)?;
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8], position: u64) -> XmlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::malformed(position, e))
}

/// Namespace scope: prefix (`None` for default) to URI
type Scope = HashMap<Option<String>, Option<String>>;

#[derive(Default)]
struct TreeBuilder {
    declaration: Option<Declaration>,
    prolog: Vec<Node>,
    epilog: Vec<Node>,
    root: Option<Element>,
    stack: Vec<Element>,
    scopes: Vec<Scope>,
}

impl TreeBuilder {
    /// Build element from a start tag and push its namespace scope
    fn open(&mut self, start: &BytesStart<'_>, position: u64) -> XmlResult<Element> {
        let name = utf8(start.name().as_ref(), position)?;
        let mut attributes = Vec::new();
        let mut scope = Scope::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::malformed(position, e))?;
            let key = utf8(attr.key.as_ref(), position)?;
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::malformed(position, e))?
                .into_owned();
            if key == "xmlns" {
                scope.insert(None, (!value.is_empty()).then(|| value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.insert(Some(prefix.to_string()), Some(value.clone()));
            }
            attributes.push(Attribute { name: key, value });
        }
        self.scopes.push(scope);

        let prefix = name.split_once(':').map(|(p, _)| p.to_string());
        let namespace = self.lookup(&prefix);
        Ok(Element::from_parts(name, namespace, attributes))
    }

    fn lookup(&self, prefix: &Option<String>) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .cloned()
            .flatten()
    }

    fn attach(&mut self, node: Node) -> XmlResult<()> {
        if let Some(parent) = self.stack.last_mut() {
            parent.push_node(node);
            return Ok(());
        }
        match node {
            Node::Element(element) => {
                if self.root.is_some() {
                    return Err(XmlError::MultipleRoots);
                }
                self.root = Some(element);
            }
            other if self.root.is_some() => self.epilog.push(other),
            other => self.prolog.push(other),
        }
        Ok(())
    }
}

fn write_node(f: &mut Formatter<'_>, node: &Node, default_ns: Option<&str>) -> fmt::Result {
    match node {
        Node::Element(e) => write_element(f, e, default_ns),
        Node::Text(t) => f.write_str(&partial_escape(t.as_str())),
        Node::CData(t) => write!(f, "<![CDATA[{t}]]>"),
        Node::Comment(t) => write!(f, "<!--{t}-->"),
        Node::ProcessingInstruction(t) => write!(f, "<?{t}?>"),
        Node::DocType(t) => write!(f, "<!DOCTYPE {t}>"),
    }
}

/// Attribute values are always written double-quoted, so apostrophes stay
/// literal.
fn escape_attribute(value: &str) -> Cow<'_, str> {
    let escaped = minimal_escape(value);
    if escaped.contains('"') {
        Cow::Owned(escaped.replace('"', "&quot;"))
    } else {
        escaped
    }
}

/// Write element, dropping `xmlns` declarations that repeat the default
/// namespace already in scope and adding one where an element's namespace
/// differs from it.
fn write_element(f: &mut Formatter<'_>, element: &Element, default_ns: Option<&str>) -> fmt::Result {
    write!(f, "<{}", element.name())?;

    let mut scope_ns = default_ns;
    let mut declared = false;
    for attr in element.attributes() {
        if attr.name == "xmlns" {
            let value = (!attr.value.is_empty()).then_some(attr.value.as_str());
            if value == default_ns {
                continue;
            }
            scope_ns = value;
            declared = true;
        }
        write!(f, " {}=\"{}\"", attr.name, escape_attribute(&attr.value))?;
    }

    if !declared && element.prefix().is_none() && element.namespace() != scope_ns {
        scope_ns = element.namespace();
        write!(f, " xmlns=\"{}\"", escape_attribute(scope_ns.unwrap_or_default()))?;
    }

    if element.children().is_empty() {
        return f.write_str(" />");
    }
    f.write_str(">")?;
    for child in element.children() {
        write_node(f, child, scope_ns)?;
    }
    write!(f, "</{}>", element.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MSBUILD_NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

    const PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <!-- references -->
  <ItemGroup>
    <Reference Include="VRage.Game">
      <HintPath>C:\Games\Bin64\VRage.Game.dll</HintPath>
    </Reference>
    <Compile Include="Program.cs" />
  </ItemGroup>
</Project>"#;

    #[test]
    fn parse_resolves_default_namespace() {
        let doc = Document::parse(PROJECT).unwrap();
        assert_eq!(doc.root().local_name(), "Project");
        assert_eq!(doc.root().namespace(), Some(MSBUILD_NS));

        let group = doc.root().child("ItemGroup").unwrap();
        let reference = group.child("Reference").unwrap();
        assert_eq!(reference.namespace(), Some(MSBUILD_NS));
        assert_eq!(
            reference.child_text("HintPath").as_deref(),
            Some(r"C:\Games\Bin64\VRage.Game.dll")
        );
    }

    #[test]
    fn untouched_document_round_trips() {
        let doc = Document::parse(PROJECT).unwrap();
        assert_eq!(doc.to_string(), PROJECT);
    }

    #[test]
    fn bom_is_preserved() {
        let with_bom = format!("{BOM}{PROJECT}");
        let doc = Document::parse(&with_bom).unwrap();
        assert_eq!(doc.to_string(), with_bom);
    }

    #[test]
    fn new_elements_inherit_namespace_without_redeclaring() {
        let mut doc = Document::parse(PROJECT).unwrap();
        let group = doc.root_mut().child_mut("ItemGroup").unwrap();
        group.push_element(Element::new("AdditionalFiles").with_attribute("Include", r"MDK\whitelist.cache"));

        let out = doc.to_string();
        assert!(out.contains(r#"<AdditionalFiles Include="MDK\whitelist.cache" />"#));
        assert_eq!(out.matches("xmlns=").count(), 1);
    }

    #[test]
    fn duplicate_namespace_declarations_collapse() {
        let source = r#"<Project xmlns="urn:a"><ItemGroup xmlns="urn:a"><None Include="x" /></ItemGroup></Project>"#;
        let doc = Document::parse(source).unwrap();
        assert_eq!(
            doc.to_string(),
            r#"<Project xmlns="urn:a"><ItemGroup><None Include="x" /></ItemGroup></Project>"#
        );
    }

    #[test]
    fn foreign_namespace_is_declared() {
        let mut doc = Document::parse(r#"<Project xmlns="urn:a"></Project>"#).unwrap();
        doc.root_mut().push_element(Element::new_in("Other", Some("urn:b")));
        assert_eq!(
            doc.to_string(),
            r#"<Project xmlns="urn:a"><Other xmlns="urn:b" /></Project>"#
        );
    }

    #[test]
    fn escapes_are_round_tripped() {
        let source = r#"<a b="x &amp; &quot;y&quot;">1 &lt; 2</a>"#;
        let doc = Document::parse(source).unwrap();
        assert_eq!(doc.root().attribute("b"), Some(r#"x & "y""#));
        assert_eq!(doc.root().text(), "1 < 2");
        assert_eq!(doc.to_string(), source);
    }

    #[test]
    fn single_quoted_conditions_are_written_verbatim() {
        let source = format!(
            r#"<Project xmlns="{MSBUILD_NS}">
  <PropertyGroup Condition=" '$(Configuration)|$(Platform)' == 'Debug|AnyCPU' ">
    <Optimize>false</Optimize>
  </PropertyGroup>
</Project>"#
        );
        let mut doc = Document::parse(&source).unwrap();
        doc.root_mut()
            .push_element(Element::new("ItemGroup").with_attribute("Label", r#"say "hi" & 'bye'"#));

        let out = doc.to_string();
        assert!(out.contains(r#"Condition=" '$(Configuration)|$(Platform)' == 'Debug|AnyCPU' ""#));
        assert!(out.contains(r#"Label="say &quot;hi&quot; &amp; 'bye'""#));
        assert!(!out.contains("&apos;"));

        let reparsed = Document::parse(&out).unwrap();
        assert_eq!(
            reparsed.root().child("ItemGroup").unwrap().attribute("Label"),
            Some(r#"say "hi" & 'bye'"#)
        );
    }

    #[test]
    fn element_handles_resolve() {
        let doc = Document::parse(PROJECT).unwrap();
        let (group_idx, _) = doc
            .root()
            .elements()
            .find(|(_, e)| e.local_name() == "ItemGroup")
            .unwrap();
        let (item_idx, _) = doc
            .root()
            .child_at(group_idx)
            .unwrap()
            .elements()
            .find(|(_, e)| e.local_name() == "Compile")
            .unwrap();

        let path = ElementPath::root().child(group_idx).child(item_idx);
        assert_eq!(doc.element(&path).unwrap().attribute("Include"), Some("Program.cs"));
        assert!(doc.element(&ElementPath::root().child(999)).is_none());
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = Document::parse("<?xml version=\"1.0\"?>\n<!-- nothing -->").unwrap_err();
        assert!(matches!(err, XmlError::MissingRoot));
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        assert!(Document::parse("<a><b></a>").is_err());
        assert!(Document::parse("<a>").is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.csproj");

        let doc = Document::parse(PROJECT).unwrap();
        doc.save(&path).unwrap();

        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn load_missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::load(dir.path().join("nope.xml")).unwrap_err();
        assert!(err.is_not_found());
    }
}
