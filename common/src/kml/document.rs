//! KML ドキュメントツリー
//!
//! quick-xml のイベントをアリーナ（`Vec<Node>`）上の所有ツリーに組み立てる。
//! ノードは `NodeId`（アリーナ内の位置）で参照し、外した（detach）ノードも
//! アリーナには残るがドキュメントからは到達できなくなる。

use crate::error::{Error, Result};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// ツリー内ノードの参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    CData(String),
    /// エスケープ済みの生テキスト
    Comment(String),
    Declaration {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// 解析済み KML
#[derive(Debug, Clone)]
pub struct KmlDocument {
    nodes: Vec<Node>,
}

const DOCUMENT_NODE: NodeId = NodeId(0);

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| Error::Parse(format!("KML is not valid UTF-8: {}", e)))
}

fn element_kind(e: &BytesStart<'_>) -> Result<NodeKind> {
    let name = utf8(e.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::Parse(format!("KML attribute in <{}>: {}", name, err)))?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|err| Error::Parse(format!("KML attribute {}: {}", key, err)))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(NodeKind::Element { name, attributes })
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::Io(std::io::Error::other(e.to_string()))
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl KmlDocument {
    /// 空のドキュメント（ルート要素なし）
    pub fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// KML テキストを解析する
    ///
    /// 整形式でなければ `Error::Parse`。
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = Self::empty();
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<NodeId> = vec![DOCUMENT_NODE];

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::Parse(format!(
                    "KML parse failed at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;
            let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);

            match event {
                Event::Start(e) => {
                    let id = doc.push(element_kind(&e)?, Some(parent));
                    stack.push(id);
                }
                Event::Empty(e) => {
                    doc.push(element_kind(&e)?, Some(parent));
                }
                Event::End(_) => {
                    if stack.len() <= 1 {
                        return Err(Error::Parse("KML has an unmatched closing tag".into()));
                    }
                    stack.pop();
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::Parse(format!("KML text: {}", err)))?
                        .into_owned();
                    doc.push(NodeKind::Text(text), Some(parent));
                }
                Event::CData(e) => {
                    doc.push(NodeKind::CData(utf8(&e)?), Some(parent));
                }
                Event::Comment(e) => {
                    doc.push(NodeKind::Comment(utf8(&e)?), Some(parent));
                }
                Event::Decl(e) => {
                    let version = e
                        .version()
                        .map_err(|err| Error::Parse(format!("XML declaration: {}", err)))
                        .and_then(|v| utf8(&v))?;
                    let encoding = match e.encoding() {
                        Some(Ok(v)) => Some(utf8(&v)?),
                        _ => None,
                    };
                    let standalone = match e.standalone() {
                        Some(Ok(v)) => Some(utf8(&v)?),
                        _ => None,
                    };
                    doc.push(
                        NodeKind::Declaration {
                            version,
                            encoding,
                            standalone,
                        },
                        Some(parent),
                    );
                }
                Event::PI(e) => {
                    doc.push(NodeKind::ProcessingInstruction(utf8(&e)?), Some(parent));
                }
                Event::DocType(e) => {
                    doc.push(NodeKind::DocType(utf8(&e)?), Some(parent));
                }
                Event::Eof => break,
            }
        }

        if stack.len() > 1 {
            return Err(Error::Parse("KML ended before all elements were closed".into()));
        }
        if doc.root_element().is_none() {
            return Err(Error::Parse("KML has no root element".into()));
        }
        Ok(doc)
    }

    /// ツリー全体を XML 文字列に戻す
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for &child in &self.nodes[DOCUMENT_NODE.0].children {
            self.write_node(&mut writer, child)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Parse(format!("serialized KML is not UTF-8: {}", e)))
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<()> {
        let node = &self.nodes[id.0];
        let result = match &node.kind {
            NodeKind::Document => Ok(()),
            NodeKind::Element { name, attributes } => {
                let mut start = BytesStart::new(name.as_str());
                for (key, value) in attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                if node.children.is_empty() {
                    writer.write_event(Event::Empty(start))
                } else {
                    writer.write_event(Event::Start(start)).map_err(write_error)?;
                    for &child in &node.children {
                        self.write_node(writer, child)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))
                }
            }
            NodeKind::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
            }
            NodeKind::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str()))),
            NodeKind::Comment(raw) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))
            }
            NodeKind::Declaration {
                version,
                encoding,
                standalone,
            } => writer.write_event(Event::Decl(BytesDecl::new(
                version,
                encoding.as_deref(),
                standalone.as_deref(),
            ))),
            NodeKind::ProcessingInstruction(raw) => {
                writer.write_event(Event::PI(BytesPI::new(raw.as_str())))
            }
            NodeKind::DocType(raw) => {
                writer.write_event(Event::DocType(BytesText::from_escaped(raw.as_str())))
            }
        };
        result.map_err(write_error)
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    /// 仮想ドキュメントノード（宣言・コメント・ルート要素の親）
    pub fn document_node(&self) -> NodeId {
        DOCUMENT_NODE
    }

    /// ルート要素（通常は `<kml>`）
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes[DOCUMENT_NODE.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.tag(c).is_some())
    }

    /// 要素名（プレフィックス込み）。要素でなければ `None`
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// プレフィックスを除いた要素名が `local` と一致するか
    pub fn is_element(&self, id: NodeId, local: &str) -> bool {
        self.tag(id).map(|n| local_part(n) == local).unwrap_or(false)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// 直下の子要素のうち名前が一致するもの
    pub fn child_elements<'a>(
        &'a self,
        id: NodeId,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_element(c, local))
    }

    pub fn first_child_element(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.child_elements(id, local).next()
    }

    /// 子孫要素（文書順、自身は含まない）
    pub fn descendants(&self, id: NodeId, local: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(cur) = stack.pop() {
            if self.is_element(cur, local) {
                out.push(cur);
            }
            stack.extend(self.children(cur).iter().rev().copied());
        }
        out
    }

    pub fn first_descendant(&self, id: NodeId, local: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(cur) = stack.pop() {
            if self.is_element(cur, local) {
                return Some(cur);
            }
            stack.extend(self.children(cur).iter().rev().copied());
        }
        None
    }

    /// 子孫のテキスト・CDATA を連結したもの
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) | NodeKind::CData(t) => out.push_str(t),
            _ => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// 子ノードをすべて外してテキスト1つに置き換える
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        self.push(NodeKind::Text(text.to_string()), Some(id));
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((key.to_string(), value.to_string())),
            }
        }
    }

    /// ドキュメント内で `id` 属性が一致する要素
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        let mut stack = vec![DOCUMENT_NODE];
        while let Some(cur) = stack.pop() {
            if self.attribute(cur, "id") == Some(value) {
                return Some(cur);
            }
            stack.extend(self.children(cur).iter().rev().copied());
        }
        None
    }

    /// 親のない要素を作る
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(
            NodeKind::Element {
                name: name.to_string(),
                attributes: Vec::new(),
            },
            None,
        )
    }

    /// `<name>text</name>` を作る
    pub fn create_text_element(&mut self, name: &str, text: &str) -> NodeId {
        let id = self.create_element(name);
        self.push(NodeKind::Text(text.to_string()), Some(id));
        id
    }

    /// `child` を `parent` の末尾に付ける（既に親があれば付け替え）
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// `child` を `parent` の `position` 番目に挿入する
    pub fn insert_child(&mut self, parent: NodeId, position: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let position = position.min(children.len());
        children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// 親から外す（アリーナには残る）
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// `id` が `ancestor` 自身かその子孫か
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if node == ancestor {
                return true;
            }
            cur = self.parent(node);
        }
        false
    }
}
