use std::sync::Arc;

use gloo_timers::callback::Timeout;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element};

use crate::dispatch::{classify, ActionNode, ActionTag};
use crate::models::{LeaderboardEntry, Reward};
use crate::reconcile::{placeholder_rows, LeaderboardView, MemberVisibility, RenderOptions};
use crate::surface::{Rect, RowContent, RowKey, RowSurface};

const ROW_EXIT_MS: u32 = 230;
const ROW_CELLS: &str = "<div class=\"cl-rank-col\"></div>\
     <div class=\"cl-icon-col\"></div>\
     <div class=\"cl-name-col\"></div>\
     <div class=\"cl-growth-col\"></div>\
     <div class=\"cl-points-col\"></div>\
     <div class=\"cl-reward-col\"></div>";

/// Leaderboard rows as real DOM nodes inside `list`, scrolled by `scroll`.
pub struct DomSurface {
    document: Document,
    list: Element,
    scroll: Element,
}

impl DomSurface {
    pub fn new(document: Document, list: Element, scroll: Element) -> Self {
        Self {
            document,
            list,
            scroll,
        }
    }
}

fn set_cell(row: &Element, selector: &str, text: &str) {
    if let Ok(Some(cell)) = row.query_selector(selector) {
        if cell.text_content().as_deref() != Some(text) {
            cell.set_text_content(Some(text));
        }
    }
}

fn apply_row_content(row: &Element, content: &RowContent) {
    set_cell(row, ".cl-rank-col", &content.rank);
    set_cell(row, ".cl-icon-col", &content.icon);
    set_cell(row, ".cl-name-col", &content.name);
    set_cell(row, ".cl-points-col", &content.points);
    set_cell(row, ".cl-reward-col", &content.reward);
    if let Ok(Some(cell)) = row.query_selector(".cl-growth-col") {
        let _ = cell.set_attribute("data-growth", content.growth.as_str());
    }

    let classes = row.class_list();
    let _ = classes.toggle_with_force("cl-lb-member-row", content.is_member);
    let _ = classes.toggle_with_force("cl-shared-rank", content.shared_rank);
    let _ = classes.toggle_with_force("lb-last", content.is_last);
}

fn to_rect(element: &Element) -> Rect {
    let rect = element.get_bounding_client_rect();
    Rect {
        top: rect.top(),
        bottom: rect.bottom(),
    }
}

impl RowSurface for DomSurface {
    type Row = Element;

    fn create_row(&mut self, key: RowKey, content: &RowContent) -> Element {
        let row = self.document.create_element("div").unwrap_throw();
        row.set_class_name("cl-lb-row");
        let _ = row.set_attribute("data-rank", &key.rank.to_string());
        let _ = row.set_attribute("data-occurrence", &key.occurrence.to_string());
        row.set_inner_html(ROW_CELLS);
        apply_row_content(&row, content);
        row
    }

    fn insert_after(&mut self, row: &Element, anchor: Option<&Element>) {
        match anchor {
            Some(anchor) => {
                let _ = anchor.after_with_node_1(row);
            }
            None => {
                let _ = self.list.append_child(row);
            }
        }
    }

    fn insert_before(&mut self, row: &Element, next: &Element) {
        let _ = self.list.insert_before(row, Some(next));
    }

    fn patch_row(&mut self, row: &Element, content: &RowContent) {
        apply_row_content(row, content);
    }

    fn remove_row(&mut self, row: &Element) {
        let _ = row.class_list().add_1("cl-lb-row-exit");
        let row = row.clone();
        let timeout = Timeout::new(ROW_EXIT_MS, move || {
            if row.is_connected() {
                row.remove();
            }
        });
        timeout.forget();
    }

    fn row_rect(&self, row: &Element) -> Option<Rect> {
        row.is_connected().then(|| to_rect(row))
    }

    fn container_rect(&self) -> Option<Rect> {
        Some(to_rect(&self.scroll))
    }
}

fn visibility_label(visibility: MemberVisibility) -> &'static str {
    match visibility {
        MemberVisibility::Absent => "absent",
        MemberVisibility::Visible => "visible",
        MemberVisibility::Hidden => "hidden",
    }
}

fn query(document: &Document, selector: &str) -> Result<Element, JsValue> {
    document
        .query_selector(selector)?
        .ok_or_else(|| JsValue::from_str(&format!("no element matches {selector}")))
}

/// Browser entry point: reconciles JSON leaderboard rows into a container.
#[wasm_bindgen]
pub struct LeaderboardMount {
    view: LeaderboardView<DomSurface>,
}

#[wasm_bindgen]
impl LeaderboardMount {
    #[wasm_bindgen(constructor)]
    pub fn new(
        list_selector: &str,
        scroll_selector: &str,
        member_ref_id: Option<String>,
        name_length: usize,
    ) -> Result<LeaderboardMount, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("document unavailable"))?;
        let list = query(&document, list_selector)?;
        let scroll = query(&document, scroll_selector)?;
        let options = RenderOptions {
            member_ref_id,
            name_length,
            ..RenderOptions::default()
        };
        Ok(Self {
            view: LeaderboardView::new(DomSurface::new(document, list, scroll), options),
        })
    }

    /// Returns the member row visibility: `absent`, `visible` or `hidden`.
    pub fn reconcile(&mut self, rows: JsValue, rewards: JsValue) -> Result<String, JsValue> {
        let rows: Vec<LeaderboardEntry> = serde_wasm_bindgen::from_value(rows)?;
        let rewards: Vec<Reward> = if rewards.is_undefined() || rewards.is_null() {
            Vec::new()
        } else {
            serde_wasm_bindgen::from_value(rewards)?
        };
        let report = self.view.reconcile(&rows, &rewards);
        Ok(visibility_label(report.member).to_string())
    }

    pub fn placeholders(&mut self, count: u32) {
        self.view.reconcile(&placeholder_rows(count), &[]);
    }

    #[wasm_bindgen(js_name = memberVisibility)]
    pub fn member_visibility(&self) -> String {
        visibility_label(self.view.member_visibility()).to_string()
    }
}

/// Builds the action chain for `element` from its `data-action` ancestors.
/// Attributes that do not parse are treated as untagged.
pub fn action_node(element: &Element) -> Arc<ActionNode> {
    let mut chain = Vec::new();
    let mut current = Some(element.clone());
    while let Some(node) = current {
        let tag = node
            .get_attribute("data-action")
            .and_then(|raw| serde_json::from_str::<ActionTag>(&raw).ok());
        current = node.parent_element();
        chain.push(tag);
    }

    let mut tags = chain.into_iter().rev();
    let mut node = ActionNode::root(tags.next().flatten());
    for tag in tags {
        node = ActionNode::child(&node, tag);
    }
    node
}

#[wasm_bindgen(js_name = actionForElement)]
pub fn action_for_element(element: &Element) -> Result<JsValue, JsValue> {
    let node = action_node(element);
    match classify(&node) {
        Some((action, _)) => Ok(serde_wasm_bindgen::to_value(&action.tag)?),
        None => Ok(JsValue::NULL),
    }
}
