//! # Element 模块
//!
//! 事件目标的最小描述。宿主把命中的元素及其祖先按“目标在前、根在后”
//! 的顺序传进来，交互判定只看这条路径。

use serde::{Deserialize, Serialize};

/// 元素节点
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementNode {
    /// 小写标签名
    pub tag: String,
    pub role: Option<String>,
    pub classes: Vec<String>,
    /// `<input type=...>`
    pub input_type: Option<String>,
    pub aria_hidden: bool,
    /// 计算样式 `cursor: pointer`
    pub pointer_cursor: bool,
}

impl ElementNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_input_type(mut self, input_type: &str) -> Self {
        self.input_type = Some(input_type.to_string());
        self
    }

    pub fn aria_hidden(mut self) -> Self {
        self.aria_hidden = true;
        self
    }

    pub fn with_pointer_cursor(mut self) -> Self {
        self.pointer_cursor = true;
        self
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// 目标到根的路径
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementPath(Vec<ElementNode>);

impl ElementPath {
    pub fn new(nodes: Vec<ElementNode>) -> Self {
        Self(nodes)
    }

    /// 单节点路径
    pub fn leaf(node: ElementNode) -> Self {
        Self(vec![node])
    }

    /// 在路径前端加一个子节点
    pub fn child(mut self, node: ElementNode) -> Self {
        self.0.insert(0, node);
        self
    }

    pub fn target(&self) -> Option<&ElementNode> {
        self.0.first()
    }

    /// 从目标开始向上找第一个满足条件的节点
    pub fn closest(&self, predicate: impl Fn(&ElementNode) -> bool) -> Option<&ElementNode> {
        self.0.iter().find(|node| predicate(node))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_walks_up() {
        let path = ElementPath::leaf(ElementNode::new("a").with_class("nav"))
            .child(ElementNode::new("SPAN"));
        assert_eq!(path.target().map(|n| n.tag.as_str()), Some("span"));
        assert!(path.closest(|n| n.is_tag("a")).is_some());
        assert!(path.closest(|n| n.is_tag("button")).is_none());
    }
}
