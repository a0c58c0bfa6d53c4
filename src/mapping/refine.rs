use super::positional::positional_owners;
use super::{assemble, walk_order, ClassifiedViewpoint, StepMapping, StepViewpointMapper};
use crate::artifacts::Step;

/// Domain concepts shared between viewpoint text and step text.
const DOMAIN_KEYWORDS: &[&[&str]] = &[
    &["input", "fill", "type", "入力", "テキスト"],
    &["button", "click", "ボタン", "押", "クリック"],
    &["navigate", "load", "goto", "link", "遷移", "リンク", "ページ"],
    &["select", "option", "選択", "プルダウン"],
    &["check", "checkbox", "radio", "チェック", "ラジオ"],
    &["assert", "visible", "display", "表示", "見出し"],
    &["search", "filter", "検索", "絞り込み"],
    &["submit", "送信", "登録", "予約"],
    &["error", "invalid", "エラー", "不正"],
    &["login", "password", "ログイン", "パスワード"],
];

/// Positional mapping with a boundary correction: the first step of a
/// viewpoint moves back to the previous viewpoint when its keyword overlap
/// with that viewpoint is strictly higher. At most one step moves per
/// boundary and no viewpoint is emptied.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRefinedMapper;

impl StepViewpointMapper for KeywordRefinedMapper {
    fn map(&self, viewpoints: &[ClassifiedViewpoint], steps: &[Step]) -> StepMapping {
        let ordered = walk_order(viewpoints);
        let mut owners = positional_owners(ordered.len(), steps.len());

        let boundaries: Vec<usize> = (1..owners.len())
            .filter(|&idx| {
                matches!((owners[idx - 1], owners[idx]), (Some(prev), Some(next)) if prev + 1 == next)
            })
            .collect();
        for idx in boundaries {
            let (Some(prev), Some(next)) = (owners[idx - 1], owners[idx]) else {
                continue;
            };
            let remaining = owners.iter().filter(|owner| **owner == Some(next)).count();
            if remaining < 2 {
                continue;
            }
            let text = step_text(&steps[idx]);
            let prev_score = overlap(&text, &ordered[prev].viewpoint.text);
            let next_score = overlap(&text, &ordered[next].viewpoint.text);
            if prev_score > next_score {
                tracing::debug!(step = idx, from = next, to = prev, "moved boundary step");
                owners[idx] = Some(prev);
            }
        }
        assemble(&ordered, &owners)
    }
}

fn step_text(step: &Step) -> String {
    format!("{} {} {}", step.label, step.action, step.target).to_lowercase()
}

/// Number of domain concepts mentioned by both texts.
fn overlap(step_text: &str, viewpoint_text: &str) -> usize {
    let viewpoint_text = viewpoint_text.to_lowercase();
    DOMAIN_KEYWORDS
        .iter()
        .filter(|concept| {
            concept.iter().any(|kw| step_text.contains(kw))
                && concept.iter().any(|kw| viewpoint_text.contains(kw))
        })
        .count()
}
