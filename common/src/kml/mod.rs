//! KML 関連処理
//!
//! - document: 所有ツリー（解析・出力・編集）
//! - points: Placemark から HP ポイントを抽出
//! - フォルダ検索（名前の並びで大文字小文字を無視）

pub mod document;
pub mod points;

pub use document::{KmlDocument, NodeId};
pub use points::extract_points;

/// フォルダ名（直下の `<name>` のテキスト、前後空白除去）
pub fn folder_name(doc: &KmlDocument, folder: NodeId) -> String {
    doc.first_child_element(folder, "name")
        .map(|n| doc.text(n).trim().to_string())
        .unwrap_or_default()
}

/// `<Document>` 要素（フォルダ追加先）
pub fn document_element(doc: &KmlDocument) -> Option<NodeId> {
    let root = doc.root_element()?;
    if doc.is_element(root, "Document") {
        return Some(root);
    }
    doc.first_descendant(root, "Document")
}

/// 名前の並び（例: `HP` → `HOME`）でフォルダを探す
///
/// 先頭の名前はドキュメント内のどの深さのフォルダでもよく、以降は直下の子フォルダを辿る。
/// 最初に全体が一致したものを返す。
pub fn find_folder_by_path<S: AsRef<str>>(doc: &KmlDocument, path: &[S]) -> Option<NodeId> {
    let (first, rest) = path.split_first()?;
    let root = doc.root_element()?;

    'candidates: for folder in doc.descendants(root, "Folder") {
        if !same_name(&folder_name(doc, folder), first.as_ref()) {
            continue;
        }
        let mut cur = folder;
        for name in rest {
            match child_folder(doc, cur, name.as_ref()) {
                Some(next) => cur = next,
                None => continue 'candidates,
            }
        }
        return Some(cur);
    }
    None
}

/// 直下の子フォルダを名前で探す（大文字小文字を無視）
pub fn child_folder(doc: &KmlDocument, parent: NodeId, name: &str) -> Option<NodeId> {
    doc.child_elements(parent, "Folder")
        .find(|&f| same_name(&folder_name(doc, f), name))
}

/// 名前比較（前後空白除去・大文字小文字無視）
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_uppercase() == b.trim().to_uppercase()
}

/// `parent` 直下に名前付きフォルダを作る
pub fn create_folder(doc: &mut KmlDocument, parent: NodeId, name: &str) -> NodeId {
    let folder = doc.create_element("Folder");
    let name_node = doc.create_text_element("name", name);
    doc.append_child(folder, name_node);
    doc.append_child(parent, folder);
    folder
}

/// `parent` から名前の並びでフォルダを辿り、なければ各階層を作る
pub fn ensure_folder_path<S: AsRef<str>>(
    doc: &mut KmlDocument,
    parent: NodeId,
    path: &[S],
) -> NodeId {
    let mut cur = parent;
    for name in path {
        cur = match child_folder(doc, cur, name.as_ref()) {
            Some(existing) => existing,
            None => {
                tracing::debug!(folder = name.as_ref(), "creating folder");
                create_folder(doc, cur, name.as_ref())
            }
        };
    }
    cur
}
