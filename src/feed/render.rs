use super::parser::FeedItem;
use crate::util::truncate_chars;

/// Item limit used when a feed does not configure `item_display_limit`.
pub const DEFAULT_MAX_ITEMS: usize = 8;

/// Longest item title (in characters) kept on a rendered line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 100;

/// Renders items as a Markdown bullet list of links.
///
/// Each line is `- [<title>](<link>)` with the title cut to
/// `max_line_length` characters. Items keep the feed's order; anything past
/// `max_items` is dropped. No items (or `max_items == 0`) renders as `""`.
///
/// # Examples
///
/// ```
/// use rss_to_hass::feed::{render, FeedItem};
///
/// let items = vec![FeedItem::new("A", "http://a"), FeedItem::new("B", "http://b")];
/// assert_eq!(render(&items, 8, 100), "- [A](http://a)\n- [B](http://b)");
/// ```
pub fn render(items: &[FeedItem], max_items: usize, max_line_length: usize) -> String {
    items
        .iter()
        .take(max_items)
        .map(|item| {
            format!(
                "- [{}]({})",
                truncate_chars(&item.title, max_line_length),
                item.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
