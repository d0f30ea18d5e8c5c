use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::FileOptions;
use zip::CompressionMethod;

/// One finished page ready for binding. A page with no image still gets a
/// text-only spread.
pub struct BookPage {
    pub number: usize,
    pub text: String,
    pub image: Option<Vec<u8>>,
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Packs cover and pages into an EPUB 3 container at `path`.
pub fn write_epub(path: &Path, title: &str, cover: Option<&[u8]>, pages: &[BookPage]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // Readers require the mimetype entry first and uncompressed.
    writer.start_file("mimetype", stored)?;
    writer.write_all(b"application/epub+zip")?;

    writer.start_file("META-INF/container.xml", deflated)?;
    writer.write_all(CONTAINER_XML.as_bytes())?;

    writer.start_file("OEBPS/content.opf", deflated)?;
    writer.write_all(content_opf(title, cover.is_some(), pages).as_bytes())?;

    writer.start_file("OEBPS/nav.xhtml", deflated)?;
    writer.write_all(nav_xhtml(title, pages).as_bytes())?;

    writer.start_file("OEBPS/cover.xhtml", deflated)?;
    writer.write_all(cover_xhtml(title, cover.is_some()).as_bytes())?;

    if let Some(bytes) = cover {
        writer.start_file("OEBPS/images/cover.jpg", deflated)?;
        writer.write_all(bytes)?;
    }

    for page in pages {
        writer.start_file(format!("OEBPS/page_{:03}.xhtml", page.number), deflated)?;
        writer.write_all(page_xhtml(page).as_bytes())?;

        if let Some(bytes) = &page.image {
            writer.start_file(format!("OEBPS/images/page_{:03}.jpg", page.number), deflated)?;
            writer.write_all(bytes)?;
        }
    }

    writer.finish()?;
    Ok(())
}

fn content_opf(title: &str, has_cover: bool, pages: &[BookPage]) -> String {
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let identifier = format!("urn:storyteller:{}", slugify(title));

    let mut opf = String::new();
    opf.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    opf.push('\n');
    opf.push_str(
        r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id">"#,
    );
    opf.push('\n');
    opf.push_str(r#"  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">"#);
    opf.push('\n');
    opf.push_str(&format!(
        "    <dc:identifier id=\"book-id\">{}</dc:identifier>\n",
        xml_escape(&identifier)
    ));
    opf.push_str(&format!("    <dc:title>{}</dc:title>\n", xml_escape(title)));
    opf.push_str("    <dc:language>en</dc:language>\n");
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{modified}</meta>\n"
    ));
    opf.push_str("  </metadata>\n");

    opf.push_str("  <manifest>\n");
    opf.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    opf.push_str("    <item id=\"cover\" href=\"cover.xhtml\" media-type=\"application/xhtml+xml\"/>\n");
    if has_cover {
        opf.push_str(
            "    <item id=\"cover-image\" href=\"images/cover.jpg\" media-type=\"image/jpeg\" properties=\"cover-image\"/>\n",
        );
    }
    for page in pages {
        opf.push_str(&format!(
            "    <item id=\"page-{n:03}\" href=\"page_{n:03}.xhtml\" media-type=\"application/xhtml+xml\"/>\n",
            n = page.number
        ));
        if page.image.is_some() {
            opf.push_str(&format!(
                "    <item id=\"img-{n:03}\" href=\"images/page_{n:03}.jpg\" media-type=\"image/jpeg\"/>\n",
                n = page.number
            ));
        }
    }
    opf.push_str("  </manifest>\n");

    opf.push_str("  <spine>\n");
    opf.push_str("    <itemref idref=\"cover\"/>\n");
    for page in pages {
        opf.push_str(&format!(
            "    <itemref idref=\"page-{:03}\"/>\n",
            page.number
        ));
    }
    opf.push_str("  </spine>\n");
    opf.push_str("</package>\n");
    opf
}

fn nav_xhtml(title: &str, pages: &[BookPage]) -> String {
    let mut nav = String::new();
    nav.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    nav.push('\n');
    nav.push_str("<!DOCTYPE html>\n");
    nav.push_str(
        r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">"#,
    );
    nav.push('\n');
    nav.push_str(&format!(
        "<head><title>{}</title></head>\n<body>\n",
        xml_escape(title)
    ));
    nav.push_str("<nav epub:type=\"toc\">\n  <h1>Contents</h1>\n  <ol>\n");
    nav.push_str("    <li><a href=\"cover.xhtml\">Cover</a></li>\n");
    for page in pages {
        nav.push_str(&format!(
            "    <li><a href=\"page_{n:03}.xhtml\">Page {n}</a></li>\n",
            n = page.number
        ));
    }
    nav.push_str("  </ol>\n</nav>\n</body>\n</html>\n");
    nav
}

fn cover_xhtml(title: &str, has_cover: bool) -> String {
    let mut page = String::new();
    page.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    page.push('\n');
    page.push_str("<!DOCTYPE html>\n");
    page.push_str(r#"<html xmlns="http://www.w3.org/1999/xhtml">"#);
    page.push('\n');
    page.push_str(&format!(
        "<head><title>{}</title></head>\n<body>\n",
        xml_escape(title)
    ));
    page.push_str(&format!("  <h1>{}</h1>\n", xml_escape(title)));
    if has_cover {
        page.push_str(&format!(
            "  <img src=\"images/cover.jpg\" alt=\"{}\"/>\n",
            xml_escape(title)
        ));
    }
    page.push_str("</body>\n</html>\n");
    page
}

fn page_xhtml(page: &BookPage) -> String {
    let mut xhtml = String::new();
    xhtml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xhtml.push('\n');
    xhtml.push_str("<!DOCTYPE html>\n");
    xhtml.push_str(r#"<html xmlns="http://www.w3.org/1999/xhtml">"#);
    xhtml.push('\n');
    xhtml.push_str(&format!(
        "<head><title>Page {}</title></head>\n<body>\n",
        page.number
    ));
    if page.image.is_some() {
        xhtml.push_str(&format!(
            "  <img src=\"images/page_{:03}.jpg\" alt=\"Illustration for page {}\"/>\n",
            page.number, page.number
        ));
    }
    xhtml.push_str(&format!("  <p>{}</p>\n", xml_escape(&page.text)));
    xhtml.push_str("</body>\n</html>\n");
    xhtml
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Filesystem-safe name derived from the book title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "storybook".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    fn sample_pages() -> Vec<BookPage> {
        vec![
            BookPage {
                number: 1,
                text: "Rex stomps loud.".to_string(),
                image: Some(b"jpegdata1".to_vec()),
            },
            BookPage {
                number: 2,
                text: "Rex & friends clap.".to_string(),
                image: None,
            },
        ]
    }

    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> String {
        let mut entry = archive.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn mimetype_is_first_and_stored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, "Rex Rocks Out", Some(b"coverdata"), &sample_pages()).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);

        assert_eq!(
            read_entry(&mut archive, "mimetype"),
            "application/epub+zip"
        );
    }

    #[test]
    fn container_points_at_package_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, "Rex Rocks Out", None, &sample_pages()).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let container = read_entry(&mut archive, "META-INF/container.xml");
        assert!(container.contains("OEBPS/content.opf"));
    }

    #[test]
    fn pages_without_images_get_text_only_spreads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, "Rex Rocks Out", None, &sample_pages()).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let page_two = read_entry(&mut archive, "OEBPS/page_002.xhtml");
        assert!(!page_two.contains("<img"));
        assert!(page_two.contains("Rex &amp; friends clap."));
        assert!(archive.by_name("OEBPS/images/page_002.jpg").is_err());

        let page_one = read_entry(&mut archive, "OEBPS/page_001.xhtml");
        assert!(page_one.contains("images/page_001.jpg"));
    }

    #[test]
    fn cover_image_is_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, "Rex Rocks Out", None, &sample_pages()).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert!(archive.by_name("OEBPS/images/cover.jpg").is_err());

        let opf = read_entry(&mut archive, "OEBPS/content.opf");
        assert!(!opf.contains("cover-image"));
        let cover = read_entry(&mut archive, "OEBPS/cover.xhtml");
        assert!(cover.contains("<h1>Rex Rocks Out</h1>"));
    }

    #[test]
    fn opf_lists_every_page_in_spine_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, "Tales & Tails", Some(b"c"), &sample_pages()).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let opf = read_entry(&mut archive, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Tales &amp; Tails</dc:title>"));
        assert!(opf.contains("properties=\"cover-image\""));

        let cover_ref = opf.find("<itemref idref=\"cover\"/>").unwrap();
        let first_ref = opf.find("<itemref idref=\"page-001\"/>").unwrap();
        let second_ref = opf.find("<itemref idref=\"page-002\"/>").unwrap();
        assert!(cover_ref < first_ref && first_ref < second_ref);
    }

    #[test]
    fn slugify_produces_filesystem_safe_names() {
        assert_eq!(slugify("Rex Rocks Out"), "rex-rocks-out");
        assert_eq!(slugify("  Tales & Tails!  "), "tales-tails");
        assert_eq!(slugify("!!!"), "storybook");
        assert_eq!(slugify("A Storyteller Lab Creation"), "a-storyteller-lab-creation");
    }
}
