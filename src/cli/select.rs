//! Selection Mapper - Multi-select với sentinel "All".
//!
//! "All" chỉ được thêm vào menu khi có nhiều hơn một candidate; chọn đúng
//! một mình "All" thì mở rộng thành toàn bộ danh sách. Logic reconcile
//! tách riêng thành hàm pure để test được các edge case (single candidate,
//! empty selection) không cần terminal.

use anyhow::{Context, Result};
use inquire::MultiSelect;
use thiserror::Error;

/// Giá trị sentinel mở rộng thành toàn bộ candidates
pub const ALL_SENTINEL: &str = "All";

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no items selected")]
    Empty,
}

/// Dựng danh sách options cho menu: thêm "All" lên đầu khi có nhiều hơn
/// một candidate.
pub fn build_options(candidates: &[String]) -> Vec<String> {
    if candidates.len() > 1 {
        let mut options = Vec::with_capacity(candidates.len() + 1);
        options.push(ALL_SENTINEL.to_string());
        options.extend(candidates.iter().cloned());
        options
    } else {
        candidates.to_vec()
    }
}

/// Đối chiếu lựa chọn của user về danh sách cuối cùng.
///
/// Chọn đúng `{sentinel}` thì trả về toàn bộ candidates theo thứ tự gốc.
/// Ngược lại giữ các tên có trong candidates, bỏ trùng lặp, kết quả theo
/// thứ tự candidates.
pub fn reconcile(
    candidates: &[String],
    raw_selection: &[String],
    sentinel: &str,
) -> Result<Vec<String>, SelectionError> {
    let result: Vec<String> = if raw_selection.len() == 1 && raw_selection[0] == sentinel {
        candidates.to_vec()
    } else {
        candidates
            .iter()
            .filter(|c| raw_selection.contains(c))
            .cloned()
            .collect()
    };

    if result.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(result)
}

/// Hiện menu multi-select và reconcile kết quả.
pub fn prompt_multi_select(message: &str, candidates: &[String]) -> Result<Vec<String>> {
    let options = build_options(candidates);
    let chosen = MultiSelect::new(message, options)
        .prompt()
        .context("Failed to get user selection")?;

    Ok(reconcile(candidates, &chosen, ALL_SENTINEL)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sentinel_expands_to_all() {
        let candidates = strings(&["a", "b", "c"]);
        let result = reconcile(&candidates, &strings(&["All"]), ALL_SENTINEL).unwrap();
        assert_eq!(result, candidates);
    }

    #[test]
    fn test_empty_selection_fails() {
        let candidates = strings(&["a", "b"]);
        let err = reconcile(&candidates, &[], ALL_SENTINEL).unwrap_err();
        assert!(matches!(err, SelectionError::Empty));
    }

    #[test]
    fn test_unknown_names_dropped() {
        let candidates = strings(&["a", "b"]);
        let result = reconcile(&candidates, &strings(&["b", "ghost"]), ALL_SENTINEL).unwrap();
        assert_eq!(result, strings(&["b"]));
    }

    #[test]
    fn test_duplicates_removed() {
        let candidates = strings(&["a", "b"]);
        let result = reconcile(&candidates, &strings(&["b", "b", "a"]), ALL_SENTINEL).unwrap();
        assert_eq!(result, strings(&["a", "b"]));
    }

    #[test]
    fn test_sentinel_mixed_with_names_is_not_expansion() {
        // "All" kèm tên khác: sentinel bị bỏ qua, chỉ giữ tên thật
        let candidates = strings(&["a", "b"]);
        let result = reconcile(&candidates, &strings(&["All", "a"]), ALL_SENTINEL).unwrap();
        assert_eq!(result, strings(&["a"]));
    }

    #[test]
    fn test_options_include_sentinel_only_when_multiple() {
        let single = strings(&["only"]);
        assert_eq!(build_options(&single), single);

        let many = strings(&["a", "b"]);
        assert_eq!(build_options(&many), strings(&["All", "a", "b"]));
    }
}
