use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Errors for documents that cannot be read as a warnings feed at all.
///
/// These fail the whole refresh cycle. Per-item problems (a missing field,
/// an unrecognized title shape) never surface here; they degrade field by
/// field in the warning parser instead.
#[derive(Debug, Error)]
pub enum FeedFormatError {
    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The document parsed as XML but contained no element markup.
    #[error("Document contains no feed markup")]
    NotAFeed,
}

/// One raw entry from the warnings feed.
///
/// Every field is optional: absence of an element is `None`, which is
/// distinct from an element that is present but empty. The warning parser
/// relies on that distinction — an item without `<title>` is dropped, while
/// an item with an empty title merely falls back to `Unknown` everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub enclosure_url: Option<String>,
    pub link: Option<String>,
}

/// Lazy, finite, non-restartable stream of feed items.
///
/// Wraps a streaming XML reader over the raw feed text and yields one
/// [`FeedItem`] per `<item>` element, in document order. Iteration consumes
/// the underlying reader, so the stream cannot be restarted.
///
/// The channel `<title>` (used as the display header) appears before the
/// first item in RSS, so [`channel_title`](Self::channel_title) is populated
/// once iteration has passed it — in practice, after the stream is drained.
///
/// XXE note: quick-xml (0.37, pinned) never parses `<!ENTITY>` declarations,
/// and `read_text`/`decode_and_unescape_value` only resolve the five XML
/// builtin entities. A custom entity in the feed produces an escape error,
/// not expanded content. This matters because the feed is untrusted input.
pub struct ItemStream<'a> {
    reader: Reader<&'a [u8]>,
    channel_title: Option<String>,
    saw_markup: bool,
    done: bool,
}

impl<'a> ItemStream<'a> {
    /// Creates a stream over raw feed text. Parsing is lazy; errors surface
    /// from iteration, not construction.
    pub fn new(content: &'a str) -> Self {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            channel_title: None,
            saw_markup: false,
            done: false,
        }
    }

    /// The channel-level `<title>`, if one has been passed during iteration.
    pub fn channel_title(&self) -> Option<&str> {
        self.channel_title.as_deref()
    }

    /// Consumes the stream, returning all items plus the channel title.
    ///
    /// Stops at the first fatal error; items already extracted are discarded
    /// because a malformed envelope fails the cycle as a whole.
    pub fn collect_all(mut self) -> Result<(Vec<FeedItem>, Option<String>), FeedFormatError> {
        let mut items = Vec::new();
        for item in &mut self {
            items.push(item?);
        }
        Ok((items, self.channel_title))
    }

    /// Reads the children of one `<item>` element into a [`FeedItem`].
    ///
    /// Positioned just after the item's start tag; consumes through its end
    /// tag. Unrecognized child elements are skipped whole so that nested
    /// markup (e.g. a `<title>` inside an extension element) cannot bleed
    /// into the item's fields.
    fn read_item(&mut self) -> Result<FeedItem, FeedFormatError> {
        let mut item = FeedItem::default();

        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"title" => item.title = Some(self.read_element_text(e.name())?),
                    b"description" => item.description = Some(self.read_element_text(e.name())?),
                    b"pubDate" => item.pub_date = Some(self.read_element_text(e.name())?),
                    b"link" => item.link = Some(self.read_element_text(e.name())?),
                    b"enclosure" => {
                        if let Some(url) = self.enclosure_url(&e)? {
                            item.enclosure_url = Some(url);
                        }
                        self.reader
                            .read_to_end(e.name())
                            .map_err(|err| FeedFormatError::XmlParse(err.to_string()))?;
                    }
                    _ => {
                        self.reader
                            .read_to_end(e.name())
                            .map_err(|err| FeedFormatError::XmlParse(err.to_string()))?;
                    }
                },
                Ok(Event::Empty(e)) => {
                    if e.name().as_ref() == b"enclosure" {
                        if let Some(url) = self.enclosure_url(&e)? {
                            item.enclosure_url = Some(url);
                        }
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"item" => return Ok(item),
                Ok(Event::Eof) => {
                    return Err(FeedFormatError::XmlParse(
                        "unexpected end of document inside <item>".to_string(),
                    ))
                }
                Err(e) => return Err(FeedFormatError::XmlParse(e.to_string())),
                _ => {}
            }
        }
    }

    fn read_element_text(
        &mut self,
        name: quick_xml::name::QName<'_>,
    ) -> Result<String, FeedFormatError> {
        self.reader
            .read_text(name)
            .map(|text| text.trim().to_string())
            .map_err(|e| FeedFormatError::XmlParse(e.to_string()))
    }

    fn enclosure_url(
        &self,
        e: &quick_xml::events::BytesStart<'_>,
    ) -> Result<Option<String>, FeedFormatError> {
        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed enclosure attribute");
                    continue;
                }
            };
            if attr.key.as_ref() == b"url" {
                let url = attr
                    .decode_and_unescape_value(self.reader.decoder())
                    .map_err(|e| FeedFormatError::XmlParse(e.to_string()))?;
                return Ok(Some(url.to_string()));
            }
        }
        Ok(None)
    }
}

impl<'a> Iterator for ItemStream<'a> {
    type Item = Result<FeedItem, FeedFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    self.saw_markup = true;
                    match e.name().as_ref() {
                        b"item" => {
                            return match self.read_item() {
                                Ok(item) => Some(Ok(item)),
                                Err(err) => {
                                    self.done = true;
                                    Some(Err(err))
                                }
                            }
                        }
                        // First non-item <title> is the channel title
                        b"title" if self.channel_title.is_none() => {
                            match self.read_element_text(e.name()) {
                                Ok(text) => self.channel_title = Some(text),
                                Err(err) => {
                                    self.done = true;
                                    return Some(Err(err));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(_)) => self.saw_markup = true,
                Ok(Event::Eof) => {
                    self.done = true;
                    if !self.saw_markup {
                        return Some(Err(FeedFormatError::NotAFeed));
                    }
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(FeedFormatError::XmlParse(e.to_string())));
                }
                _ => {}
            }
        }
    }
}
