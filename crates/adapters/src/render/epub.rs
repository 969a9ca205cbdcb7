//! EPUB 3 packaging

use digest_press_domain::DigestIssue;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use time::OffsetDateTime;
use time::macros::format_description;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{escape, headline, markdown_to_html};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLESHEET: &str = "body{font-family:serif;line-height:1.6;margin:0 5%;}\
h1{font-size:1.6em;}\
.attribution{font-size:0.85em;font-style:italic;color:#555;}\
blockquote{margin-left:1em;padding-left:1em;border-left:2px solid #999;}";

fn chapter_name(n: usize) -> String {
    format!("chapter_{:03}.xhtml", n + 1)
}

/// Stable identifier derived from the issue so re-rendering yields the same book id
fn book_id(issue: &DigestIssue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(issue.title.as_bytes());
    hasher.update(issue.date.as_bytes());
    for article in &issue.articles {
        hasher.update(article.item_id.as_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
    format!("urn:digest-press:{}", hex)
}

fn xhtml_page(title: &str, language: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{language}\" xml:lang=\"{language}\">\n\
         <head>\n<meta charset=\"utf-8\"/>\n<title>{title}</title>\n\
         <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\"/>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn content_opf(issue: &DigestIssue, language: &str) -> String {
    let mut manifest = String::new();
    let mut spine = String::new();
    for n in 0..issue.articles.len() {
        manifest.push_str(&format!(
            "    <item id=\"ch{n}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            chapter_name(n)
        ));
        spine.push_str(&format!("    <itemref idref=\"ch{n}\"/>\n"));
    }

    let creators: Vec<&str> = {
        let mut seen = Vec::new();
        for article in &issue.articles {
            if !seen.contains(&article.source_name.as_str()) {
                seen.push(article.source_name.as_str());
            }
        }
        seen
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title} - {date}</dc:title>
    <dc:language>{language}</dc:language>
    <dc:creator>{creators}</dc:creator>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="css" href="style.css" media-type="text/css"/>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>
"#,
        id = book_id(issue),
        title = escape(&issue.title),
        date = escape(&issue.date),
        language = escape(language),
        creators = escape(&creators.join(", ")),
        modified = OffsetDateTime::now_utc()
            .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
            .unwrap_or_default(),
    )
}

fn nav_xhtml(issue: &DigestIssue, language: &str) -> String {
    let mut items = String::new();
    for (n, article) in issue.articles.iter().enumerate() {
        items.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            chapter_name(n),
            escape(headline(article))
        ));
    }

    let body = format!(
        "<nav epub:type=\"toc\" id=\"toc\">\n<h1>{}</h1>\n<ol>\n{items}</ol>\n</nav>\n",
        escape(&issue.title)
    );
    xhtml_page(&escape(&issue.title), language, &body)
}

fn chapter_xhtml(issue: &DigestIssue, n: usize, language: &str) -> String {
    let article = &issue.articles[n];
    let body = format!(
        "<p class=\"attribution\">From {} &#183; <a href=\"{}\">{}</a></p>\n{}",
        escape(&article.source_name),
        escape(&article.url),
        escape(&article.title),
        markdown_to_html(&article.body)
    );
    xhtml_page(&escape(headline(article)), language, &body)
}

pub(super) fn render(issue: &DigestIssue, language: &str) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Readers sniff the first entry: it must be the uncompressed mimetype
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(content_opf(issue, language).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(nav_xhtml(issue, language).as_bytes())?;

    zip.start_file("OEBPS/style.css", deflated)?;
    zip.write_all(STYLESHEET.as_bytes())?;

    for n in 0..issue.articles.len() {
        zip.start_file(format!("OEBPS/{}", chapter_name(n)), deflated)?;
        zip.write_all(chapter_xhtml(issue, n, language).as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{article, issue};
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut entry = archive.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let bytes = render(&issue(vec![article(1, "Text")]), "en").unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);

        assert_eq!(read_entry(&mut archive, "mimetype"), "application/epub+zip");
        assert!(read_entry(&mut archive, "META-INF/container.xml").contains("OEBPS/content.opf"));
    }

    #[test]
    fn one_chapter_per_article_in_order() {
        let bytes = render(
            &issue(vec![
                article(1, "# Opening\n\nFirst body."),
                article(2, "Second body."),
                article(3, "Third body."),
            ]),
            "en",
        )
        .unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let opf = read_entry(&mut archive, "OEBPS/content.opf");
        let first = opf.find("idref=\"ch0\"").unwrap();
        let third = opf.find("idref=\"ch2\"").unwrap();
        assert!(first < third);
        assert!(opf.contains("Creator 1, Creator 2, Creator 3"));

        let nav = read_entry(&mut archive, "OEBPS/nav.xhtml");
        assert!(nav.contains("<a href=\"chapter_001.xhtml\">Opening</a>"));
        assert!(nav.contains("<a href=\"chapter_003.xhtml\">Episode 3</a>"));

        let chapter = read_entry(&mut archive, "OEBPS/chapter_002.xhtml");
        assert!(chapter.contains("<p>Second body.</p>"));
        assert!(chapter.contains("From Creator 2"));
    }

    #[test]
    fn book_id_is_stable() {
        let first = issue(vec![article(1, "a")]);
        let second = issue(vec![article(1, "different body")]);
        assert_eq!(book_id(&first), book_id(&second));
        assert!(book_id(&first).starts_with("urn:digest-press:"));
    }
}
