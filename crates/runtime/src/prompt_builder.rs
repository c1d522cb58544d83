//! Feature-extraction prompt for a single persona dimension.
//!
//! The instruction block is fixed text; [`render`] only substitutes the
//! target dimension, the current features as compact JSON, and the
//! triggering content verbatim.

use alterego_memory::{Dimension, Feature};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("serializing current features: {0}")]
    Features(#[from] serde_json::Error),
}

const TEMPLATE: &str = "
你是一套“人格特征更新器”，你的任务是根据输入内容更新某个人格维度的特征。
你必须严格遵守以下规则：

任务：
根据给定的【维度】【已有特征】【用户近期行为（Echo）】生成新的特征列表（Feature 数组）。

输出格式（必须严格遵守）：
[
{\"name\": \"中文特征名\", \"weight\": 0.xx},
{\"name\": \"中文特征名\", \"weight\": 0.xx}
]

规则要求：
1. 所有特征名称必须是中文的、不带标点、简短的词语或短语。
2. 特征必须从属于指定维度：“{dimension}”。
3. weight 必须是 0~1 的浮点数。
4. 最终输出必须是合法 JSON，禁止输出任何解释性文本。

维度说明：
style（风格维度）：行为方式、说话风格，如：温和、犀利、冷静、机敏。
mood（情绪维度）：情绪状态，如：愉快、紧张、轻松、烦躁。
topics（兴趣主题维度）：偏好讨论的主题，如：科技、生活、哲学、编程。
expression（表达偏好维度）：表达方式，如：简洁表达、比喻表达、故事表达。

当前维度：
{current}

当前特征列表（可能为空）：
{features}

用户最近行为（Echo）：
{echo}

请基于以上内容生成新的完整特征列表（替换旧列表，而不是增量），并直接输出 JSON 数组。
不允许输出任何额外文字。
";

/// Render the update prompt for `dimension`.
///
/// Placeholders are filled in one left-to-right pass, so braces inside
/// `content` or feature names are never re-interpreted.
pub fn render(
    dimension: Dimension,
    features: &[Feature],
    content: &str,
) -> Result<String, PromptError> {
    let features_json = serde_json::to_string(features)?;
    let current = format!(
        "{}（{}）：{}",
        dimension.as_str(),
        dimension.label(),
        dimension.description()
    );

    let mut out = String::with_capacity(TEMPLATE.len() + features_json.len() + content.len());
    let mut rest = TEMPLATE;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let (value, consumed) = match placeholder(tail) {
            Some("dimension") => (dimension.as_str(), "{dimension}".len()),
            Some("current") => (current.as_str(), "{current}".len()),
            Some("features") => (features_json.as_str(), "{features}".len()),
            Some("echo") => (content, "{echo}".len()),
            _ => ("{", 1),
        };
        out.push_str(value);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

fn placeholder(tail: &str) -> Option<&str> {
    let close = tail.find('}')?;
    let name = &tail[1..close];
    name.chars()
        .all(|c| c.is_ascii_lowercase())
        .then_some(name)
}
