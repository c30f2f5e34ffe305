use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Scan a `PRODUCT_INFO` XML payload of the shape `<products><product>
/// <key>value</key>...</product>...</products>`, flattening the first
/// `<product>` element's direct children into a string map. Further
/// `<product>` siblings (if the server ever sends more than one) are
/// ignored, matching how only the first one is ever consulted.
pub fn parse_product_info(xml: &[u8]) -> HashMap<String, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut attrs = HashMap::new();
    let mut path: Vec<String> = Vec::new();
    let mut product_depth: Option<usize> = None;
    let mut in_product = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                path.push(name.clone());
                if name == "product" && product_depth.is_none() {
                    product_depth = Some(path.len());
                    in_product = true;
                }
            }
            Ok(Event::Text(text)) => {
                let is_product_child = in_product && product_depth == Some(path.len() - 1);
                if is_product_child {
                    if let Ok(value) = text.unescape() {
                        let key = path.last().unwrap().clone();
                        attrs.insert(key, value.into_owned());
                    }
                }
            }
            Ok(Event::End(_)) => {
                if in_product && product_depth == Some(path.len()) {
                    in_product = false;
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_product_children() {
        let xml = b"<products><product><country>US</country><catalogue>premium</catalogue></product></products>";
        let attrs = parse_product_info(xml);
        assert_eq!(attrs.get("country"), Some(&"US".to_string()));
        assert_eq!(attrs.get("catalogue"), Some(&"premium".to_string()));
    }

    #[test]
    fn ignores_text_outside_the_first_product() {
        let xml = b"<products><unrelated>noise</unrelated></products>";
        let attrs = parse_product_info(xml);
        assert!(attrs.is_empty());
    }

    #[test]
    fn ignores_subsequent_product_siblings() {
        let xml = b"<products><product><country>US</country></product><product><country>SE</country></product></products>";
        let attrs = parse_product_info(xml);
        assert_eq!(attrs.get("country"), Some(&"US".to_string()));
    }
}
