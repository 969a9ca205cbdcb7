//! Self-contained HTML email

use digest_press_domain::DigestIssue;
use std::fmt::Write;

use super::{escape, headline, markdown_to_html};

const STYLE: &str = "body{margin:0;background:#f4f1ea;font-family:Georgia,'Times New Roman',serif;color:#222;}\
.page{max-width:680px;margin:0 auto;background:#fff;padding:32px 40px;}\
.masthead{text-align:center;border-bottom:3px double #222;padding-bottom:16px;margin-bottom:24px;}\
.masthead h1{font-size:34px;letter-spacing:1px;margin:0;}\
.masthead .date{font-size:14px;color:#666;margin-top:6px;}\
.toc{background:#faf8f3;border:1px solid #e4dfd3;padding:12px 20px;margin-bottom:32px;}\
.toc h2{font-size:16px;text-transform:uppercase;letter-spacing:1px;}\
.toc li{margin:6px 0;}\
.toc .source{color:#777;font-size:13px;}\
article{border-top:1px solid #ddd;padding-top:24px;margin-top:32px;line-height:1.7;font-size:17px;}\
.attribution{font-size:13px;color:#777;font-style:italic;}\
blockquote{border-left:3px solid #c9b99a;margin-left:0;padding-left:16px;color:#555;}\
.footer{text-align:center;font-size:12px;color:#999;margin-top:40px;}";

pub(super) fn render(issue: &DigestIssue) -> String {
    let title = escape(&issue.title);
    let date = escape(&issue.date);

    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} - {date}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<div class=\"page\">\n\
         <header class=\"masthead\"><h1>{title}</h1><div class=\"date\">{date}</div></header>\n"
    );

    out.push_str("<nav class=\"toc\">\n<h2>In this issue</h2>\n<ol>\n");
    for (n, article) in issue.articles.iter().enumerate() {
        let _ = writeln!(
            out,
            "<li><a href=\"#article-{}\">{}</a> <span class=\"source\">{}</span></li>",
            n + 1,
            escape(headline(article)),
            escape(&article.source_name)
        );
    }
    out.push_str("</ol>\n</nav>\n");

    for (n, article) in issue.articles.iter().enumerate() {
        let _ = write!(
            out,
            "<article id=\"article-{}\">\n<p class=\"attribution\">From {} &middot; <a href=\"{}\">{}</a></p>\n{}</article>\n",
            n + 1,
            escape(&article.source_name),
            escape(&article.url),
            escape(&article.title),
            markdown_to_html(&article.body)
        );
    }

    let _ = write!(
        out,
        "<div class=\"footer\">{} articles &middot; {date}</div>\n</div>\n</body>\n</html>\n",
        issue.articles.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::{article, issue};
    use super::*;

    #[test]
    fn contains_masthead_toc_and_articles_in_order() {
        let html = render(&issue(vec![
            article(1, "# First Story\n\nAlpha paragraph."),
            article(2, "Beta paragraph."),
        ]));

        assert!(html.contains("<h1>Digest Press</h1>"));
        assert!(html.contains("October 16, 2026"));
        assert!(html.contains("<a href=\"#article-1\">First Story</a>"));
        assert!(html.contains("<a href=\"#article-2\">Episode 2</a>"));

        let alpha = html.find("Alpha paragraph").unwrap();
        let beta = html.find("Beta paragraph").unwrap();
        assert!(alpha < beta);

        assert!(html.contains("From Creator 1"));
        assert!(html.contains("href=\"https://www.youtube.com/watch?v=item2\""));
    }

    #[test]
    fn metadata_is_escaped() {
        let mut risky = article(1, "Body");
        risky.title = "Cats & <Dogs>".to_string();
        let html = render(&issue(vec![risky]));

        assert!(html.contains("Cats &amp; &lt;Dogs&gt;"));
        assert!(!html.contains("<Dogs>"));
    }
}
