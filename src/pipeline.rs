use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::census::{WordCensus, WordCensusTaker};
use crate::config::AdornConfig;
use crate::error::AdornError;
use crate::fixer::{base_name, IdFixerFilter};
use crate::numbering::{SentenceAndWordNumber, SentenceNumberAdder, SentenceNumberTable};
use crate::path::WordPathFilter;
use crate::pseudopage::PseudoPageAdderFilter;
use crate::reader::parse_file;
use crate::readorn::{adorn_sentences, AddWordAttributesFilter, WordAdorner};
use crate::strip::{StripWordAttributesFilter, StripWordElementsFilter};
use crate::wordinfo::{AdornedWordIndex, WordInfoFilter};
use crate::writer::IndentingXmlWriter;

static ADORNED_WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w\s[^>]*xml:id="[^"]+""#).unwrap());

/// What happened to one document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdornSummary {
    pub words: usize,
    pub sentences: usize,
    pub pseudo_pages: usize,
    pub elapsed: Duration,
}

fn xml_writer<W: Write>(out: W, config: &AdornConfig) -> IndentingXmlWriter<W> {
    //the second pass only recognizes words written as `<w ...>...</w>`
    let writer = IndentingXmlWriter::new(out)
        .with_indent_step(config.indent_step)
        .with_expanded_element(config.word_tag.as_str());
    match (config.doctype_name.as_ref(), config.doctype_system.as_ref()) {
        (Some(name), Some(system)) => writer.with_doctype(name.as_str(), system.as_str()),
        _ => writer,
    }
}

fn create_output(output: &Path) -> Result<BufWriter<File>, AdornError> {
    Ok(BufWriter::new(File::create(output)?))
}

/// Runs the word census over the input, as the fixer will see it
pub fn take_census(input: &Path, config: &AdornConfig) -> Result<WordCensus, AdornError> {
    let mut taker = WordCensusTaker::new(config);
    parse_file(input, &mut StripWordElementsFilter::new(&mut taker, config))?;
    Ok(taker.finish())
}

/// First pass of adornment: regenerates ids and attributes and writes the result
fn fix_ids<W: Write>(
    input: &Path,
    out: W,
    config: &AdornConfig,
    base: &str,
    census: &WordCensus,
) -> Result<(SentenceNumberTable, usize), AdornError> {
    let mut fixer = IdFixerFilter::new(xml_writer(out, config), config, base, census);
    if config.add_word_paths {
        let mut filter =
            StripWordElementsFilter::new(WordPathFilter::new(&mut fixer, config), config);
        parse_file(input, &mut filter)?;
    } else {
        let mut filter = StripWordElementsFilter::new(&mut fixer, config);
        parse_file(input, &mut filter)?;
    }
    let pseudo_pages = fixer.pseudo_page_count();
    debug!("emitted {} word elements", fixer.emitted());
    let (writer, table) = fixer.into_parts();
    writer.into_inner().flush()?;
    Ok((table, pseudo_pages))
}

/// Adds sentence and word numbers and milestones from `table` to a first pass result
fn add_sentence_numbers(
    first_pass: &NamedTempFile,
    output: &Path,
    table: &SentenceNumberTable,
    config: &AdornConfig,
) -> Result<(), AdornError> {
    let begin = Instant::now();
    let adder = SentenceNumberAdder::new(table, config)?;
    adder.process(
        BufReader::new(first_pass.reopen()?),
        create_output(output)?,
    )?;
    debug!(
        "second pass done in {} ms",
        begin.elapsed().as_millis()
    );
    Ok(())
}

fn remove_temporary(temp: NamedTempFile) {
    if let Err(e) = temp.close() {
        warn!("unable to remove temporary file: {}", e);
    }
}

/// Adorns a document that carries word elements: word ids are regenerated, word
/// attributes filled in and, when configured, sentence numbers, word numbers and
/// milestones added
pub fn adorn_file(
    input: &Path,
    output: &Path,
    config: &AdornConfig,
) -> Result<AdornSummary, AdornError> {
    let begin = Instant::now();
    info!("adorning {}", input.display());
    let census = take_census(input, config)?;
    debug!(
        "{} words, {} page breaks, highest id {}",
        census.total_words, census.total_page_breaks, census.max_id
    );
    let base = base_name(output);

    let (table, pseudo_pages) = if config.needs_second_pass() {
        info!("using two-step output");
        let temp = NamedTempFile::new()?;
        let (mut table, pseudo_pages) =
            fix_ids(input, BufWriter::new(temp.reopen()?), config, &base, &census)?;
        debug!("first pass done in {} ms", begin.elapsed().as_millis());
        table.compute_numbers(config.output_running_word_numbers);
        add_sentence_numbers(&temp, output, &table, config)?;
        remove_temporary(temp);
        (table, pseudo_pages)
    } else {
        let (mut table, pseudo_pages) =
            fix_ids(input, create_output(output)?, config, &base, &census)?;
        table.compute_numbers(config.output_running_word_numbers);
        (table, pseudo_pages)
    };

    let summary = AdornSummary {
        words: table.len(),
        sentences: table.sentence_count(),
        pseudo_pages,
        elapsed: begin.elapsed(),
    };
    info!(
        "adorned {} words in {} sentences to {} in {} ms",
        summary.words,
        summary.sentences,
        output.display(),
        summary.elapsed.as_millis()
    );
    Ok(summary)
}

/// Builds the word index of an adorned document
pub fn read_word_index(input: &Path, config: &AdornConfig) -> Result<AdornedWordIndex, AdornError> {
    let mut filter = WordInfoFilter::new(config);
    parse_file(input, &mut filter)?;
    Ok(filter.finish())
}

/// Writes an adorned document with word attributes taken from the index
fn rewrite_words<W: Write>(
    input: &Path,
    out: W,
    config: &AdornConfig,
    index: &AdornedWordIndex,
    words: usize,
) -> Result<usize, AdornError> {
    let writer = xml_writer(out, config);
    if config.output_pseudo_pages {
        let mut pages = PseudoPageAdderFilter::new(writer, config, words);
        parse_file(input, &mut AddWordAttributesFilter::new(&mut pages, index, config))?;
        let count = pages.page_count();
        pages.into_inner().into_inner().flush()?;
        Ok(count)
    } else {
        let mut filter = AddWordAttributesFilter::new(writer, index, config);
        parse_file(input, &mut filter)?;
        filter.into_inner().into_inner().flush()?;
        Ok(0)
    }
}

/// Re-adorns an already adorned document: the word index is read, every sentence is
/// passed to the adorner and the word elements are rewritten from the updated records
pub fn readorn_file<A: WordAdorner + ?Sized>(
    input: &Path,
    output: &Path,
    config: &AdornConfig,
    adorner: &mut A,
) -> Result<AdornSummary, AdornError> {
    let begin = Instant::now();
    info!("re-adorning {}", input.display());
    let mut index = read_word_index(input, config)?;
    let sentences = adorn_sentences(&mut index, adorner)?;
    let words = index.words().filter(|w| !w.gap).count();
    debug!("{} words, {} sentences", words, sentences);

    let pseudo_pages = if config.needs_second_pass() {
        info!("using two-step output");
        let mut table = SentenceNumberTable::new();
        for word in index.words().filter(|w| !w.gap) {
            table.push(SentenceAndWordNumber::new(
                word.id.as_str(),
                word.ordinal,
                word.part,
                word.eos,
            ));
        }
        table.compute_numbers(config.output_running_word_numbers);
        //numbers are added by the second pass only
        let mut first_config = config.clone();
        first_config.output_sentence_number = false;
        first_config.output_word_number = false;
        let temp = NamedTempFile::new()?;
        let pseudo_pages = rewrite_words(
            input,
            BufWriter::new(temp.reopen()?),
            &first_config,
            &index,
            words,
        )?;
        add_sentence_numbers(&temp, output, &table, config)?;
        remove_temporary(temp);
        pseudo_pages
    } else {
        rewrite_words(input, create_output(output)?, config, &index, words)?
    };

    let summary = AdornSummary {
        words,
        sentences,
        pseudo_pages,
        elapsed: begin.elapsed(),
    };
    info!(
        "re-adorned {} words to {} in {} ms",
        summary.words,
        output.display(),
        summary.elapsed.as_millis()
    );
    Ok(summary)
}

/// Reduces all word elements to their ids, preparing a document for fresh adornment
pub fn strip_file(input: &Path, output: &Path, config: &AdornConfig) -> Result<(), AdornError> {
    let begin = Instant::now();
    let mut filter = StripWordAttributesFilter::new(xml_writer(create_output(output)?, config), config);
    parse_file(input, &mut filter)?;
    filter.into_inner().into_inner().flush()?;
    info!(
        "stripped {} to {} in {} ms",
        input.display(),
        output.display(),
        begin.elapsed().as_millis()
    );
    Ok(())
}

/// Output file for an input file: same file name in the output directory, with
/// `-001`, `-002`, ... inserted before the extension when that file already exists
pub fn output_file_name(input: &Path, output_dir: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.xml".to_owned());
    let candidate = output_dir.join(&file_name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(&file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();
    let mut version = 1;
    loop {
        let candidate = output_dir.join(format!("{}-{:03}{}", stem, version, extension));
        if !candidate.exists() {
            return candidate;
        }
        version += 1;
    }
}

/// Checks the first `max_lines` lines of a file for a word element with an id
pub fn is_adorned(path: &Path, max_lines: usize) -> Result<bool, AdornError> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines().take(max_lines) {
        if ADORNED_WORD_REGEX.is_match(&line?) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readorn::KeepAdornments;
    use std::fs;

    const XMLEXAMPLE: &'static str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI><text><body>
<p><w xml:id="1">The</w> <w xml:id="2" eos="1">dog.</w></p>
<p><w xml:id="3">Yes</w> <w xml:id="4">it</w> <w xml:id="5" eos="1">barks</w></p>
</body></text></TEI>
"#;

    fn write_input(dir: &Path, xml: &str) -> Result<PathBuf, String> {
        let input = dir.join("input.xml");
        fs::write(&input, xml).map_err(|e| e.to_string())?;
        Ok(input)
    }

    /// (element name, attributes) of every element in document order, whitespace free
    fn elements(xml: &str) -> Result<Vec<(String, Vec<(String, String)>)>, String> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;
        Ok(doc
            .descendants()
            .filter(|n| n.is_element())
            .map(|n| {
                let name = match n.tag_name().namespace() {
                    Some(_) => format!("xml:{}", n.tag_name().name()),
                    None => n.tag_name().name().to_owned(),
                };
                let attribs = n
                    .attributes()
                    .map(|a| {
                        let key = match a.namespace() {
                            Some(_) => format!("xml:{}", a.name()),
                            None => a.name().to_owned(),
                        };
                        (key, a.value().to_owned())
                    })
                    .collect();
                (name, attribs)
            })
            .collect())
    }

    fn attribute<'a>(attribs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        attribs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn word_ids(xml: &str) -> Result<Vec<String>, String> {
        Ok(elements(xml)?
            .into_iter()
            .filter(|(name, _)| name == "w")
            .filter_map(|(_, attribs)| attribute(&attribs, "xml:id").map(|s| s.to_owned()))
            .collect())
    }

    #[test]
    fn test_adorn_file() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), XMLEXAMPLE)?;
        let output = dir.path().join("doc.xml");
        let summary = adorn_file(&input, &output, &AdornConfig::new()).map_err(|e| e.to_string())?;
        assert_eq!(summary.words, 5);
        assert_eq!(summary.sentences, 2);
        let xml = fs::read_to_string(&output).map_err(|e| e.to_string())?;
        assert_eq!(
            word_ids(&xml)?,
            vec!["doc-00000010", "doc-00000020", "doc-00000030", "doc-00000040", "doc-00000050"]
        );
        Ok(())
    }

    #[test]
    fn test_sentence_milestones() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(
            dir.path(),
            r#"<TEI><text><body><p><w xml:id="1">The</w> <w xml:id="2" eos="1">dog.</w></p></body></text></TEI>"#,
        )?;
        let output = dir.path().join("doc.xml");
        let config = AdornConfig::new().with_sentence_milestones(true);
        adorn_file(&input, &output, &config).map_err(|e| e.to_string())?;
        let xml = fs::read_to_string(&output).map_err(|e| e.to_string())?;
        let found: Vec<(String, Option<String>)> = elements(&xml)?
            .into_iter()
            .skip_while(|(name, _)| name != "p")
            .skip(1)
            .map(|(name, attribs)| {
                let position = attribute(&attribs, "position").map(|s| s.to_owned());
                (name, position)
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("milestone".to_owned(), Some("start".to_owned())),
                ("w".to_owned(), None),
                ("c".to_owned(), None),
                ("w".to_owned(), None),
                ("milestone".to_owned(), Some("end".to_owned())),
            ]
        );
        assert!(xml.contains(r#"<milestone unit="sentence" n="1" position="start"/>"#));
        Ok(())
    }

    #[test]
    fn test_sentence_and_word_numbers() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), XMLEXAMPLE)?;
        let output = dir.path().join("doc.xml");
        let config = AdornConfig::new()
            .with_sentence_numbers(true)
            .with_word_numbers(true);
        adorn_file(&input, &output, &config).map_err(|e| e.to_string())?;
        let xml = fs::read_to_string(&output).map_err(|e| e.to_string())?;
        let numbers: Vec<(String, String)> = elements(&xml)?
            .into_iter()
            .filter(|(name, _)| name == "w")
            .map(|(_, attribs)| {
                (
                    attribute(&attribs, "sn").unwrap_or("").to_owned(),
                    attribute(&attribs, "wn").unwrap_or("").to_owned(),
                )
            })
            .collect();
        let expected: Vec<(String, String)> = [("1", "1"), ("1", "2"), ("2", "1"), ("2", "2"), ("2", "3")]
            .iter()
            .map(|(s, w)| (s.to_string(), w.to_string()))
            .collect();
        assert_eq!(numbers, expected);
        Ok(())
    }

    #[test]
    fn test_adorn_twice_keeps_ids() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), XMLEXAMPLE)?;
        let first = dir.path().join("doc.xml");
        let second = dir.path().join("again.xml");
        adorn_file(&input, &first, &AdornConfig::new()).map_err(|e| e.to_string())?;
        adorn_file(&first, &second, &AdornConfig::new()).map_err(|e| e.to_string())?;
        let first = fs::read_to_string(&first).map_err(|e| e.to_string())?;
        let second = fs::read_to_string(&second).map_err(|e| e.to_string())?;
        assert_eq!(word_ids(&first)?, word_ids(&second)?);
        Ok(())
    }

    #[test]
    fn test_readorn_file() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), XMLEXAMPLE)?;
        let adorned = dir.path().join("doc.xml");
        let readorned = dir.path().join("doc2.xml");
        adorn_file(&input, &adorned, &AdornConfig::new()).map_err(|e| e.to_string())?;
        let config = AdornConfig::new().with_sentence_numbers(true);
        let summary = readorn_file(&adorned, &readorned, &config, &mut KeepAdornments)
            .map_err(|e| e.to_string())?;
        assert_eq!(summary.words, 5);
        assert_eq!(summary.sentences, 2);
        let xml = fs::read_to_string(&readorned).map_err(|e| e.to_string())?;
        let words: Vec<Vec<(String, String)>> = elements(&xml)?
            .into_iter()
            .filter(|(name, _)| name == "w")
            .map(|(_, attribs)| attribs)
            .collect();
        assert_eq!(words.len(), 5);
        assert_eq!(attribute(&words[4], "sn"), Some("2"));
        assert_eq!(attribute(&words[4], "eos"), Some("1"));
        //sentence numbers are written once
        assert_eq!(words[0].iter().filter(|(key, _)| key == "sn").count(), 1);
        Ok(())
    }

    /// (start, end) counts of sentence milestones
    fn sentence_milestones(xml: &str) -> Result<(usize, usize), String> {
        let positions: Vec<String> = elements(xml)?
            .into_iter()
            .filter(|(name, attribs)| {
                name == "milestone" && attribute(attribs, "unit") == Some("sentence")
            })
            .map(|(_, attribs)| attribute(&attribs, "position").unwrap_or("").to_owned())
            .collect();
        Ok((
            positions.iter().filter(|p| *p == "start").count(),
            positions.iter().filter(|p| *p == "end").count(),
        ))
    }

    #[test]
    fn test_empty_word_numbered() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(
            dir.path(),
            r#"<TEI><text><body><p><w xml:id="1">Stop</w> <w xml:id="2" eos="1"></w></p><p><w xml:id="3" eos="1">Go</w></p></body></text></TEI>"#,
        )?;
        let output = dir.path().join("doc.xml");
        let config = AdornConfig::new()
            .with_sentence_milestones(true)
            .with_sentence_numbers(true);
        adorn_file(&input, &output, &config).map_err(|e| e.to_string())?;
        let xml = fs::read_to_string(&output).map_err(|e| e.to_string())?;
        assert!(xml.contains("></w>"));
        assert_eq!(sentence_milestones(&xml)?, (2, 2));
        let numbers: Vec<String> = elements(&xml)?
            .into_iter()
            .filter(|(name, _)| name == "w")
            .map(|(_, attribs)| attribute(&attribs, "sn").unwrap_or("").to_owned())
            .collect();
        assert_eq!(numbers, vec!["1", "1", "2"]);
        Ok(())
    }

    #[test]
    fn test_readorn_keeps_milestones_paired() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), XMLEXAMPLE)?;
        let adorned = dir.path().join("doc.xml");
        let readorned = dir.path().join("doc2.xml");
        let again = dir.path().join("doc3.xml");
        let config = AdornConfig::new().with_sentence_milestones(true);
        adorn_file(&input, &adorned, &config).map_err(|e| e.to_string())?;
        readorn_file(&adorned, &readorned, &config, &mut KeepAdornments)
            .map_err(|e| e.to_string())?;
        adorn_file(&readorned, &again, &config).map_err(|e| e.to_string())?;
        for output in [&adorned, &readorned, &again] {
            let xml = fs::read_to_string(output).map_err(|e| e.to_string())?;
            assert_eq!(sentence_milestones(&xml)?, (2, 2));
        }
        Ok(())
    }

    #[test]
    fn test_strip_file() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), XMLEXAMPLE)?;
        let adorned = dir.path().join("doc.xml");
        let stripped = dir.path().join("stripped.xml");
        adorn_file(&input, &adorned, &AdornConfig::new()).map_err(|e| e.to_string())?;
        assert!(is_adorned(&adorned, 100).map_err(|e| e.to_string())?);
        strip_file(&adorned, &stripped, &AdornConfig::new()).map_err(|e| e.to_string())?;
        let xml = fs::read_to_string(&stripped).map_err(|e| e.to_string())?;
        for (name, attribs) in elements(&xml)? {
            if name == "w" {
                assert_eq!(attribs.len(), 1);
            }
        }
        Ok(())
    }

    #[test]
    fn test_is_adorned() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = write_input(dir.path(), "<TEI>\n<p><w>plain</w></p>\n</TEI>\n")?;
        assert!(!is_adorned(&input, 100).map_err(|e| e.to_string())?);
        Ok(())
    }

    #[test]
    fn test_output_file_name() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let input = Path::new("/some/where/novel.xml");
        let first = output_file_name(input, dir.path());
        assert_eq!(first, dir.path().join("novel.xml"));
        fs::write(&first, "").map_err(|e| e.to_string())?;
        let second = output_file_name(input, dir.path());
        assert_eq!(second, dir.path().join("novel-001.xml"));
        fs::write(&second, "").map_err(|e| e.to_string())?;
        assert_eq!(output_file_name(input, dir.path()), dir.path().join("novel-002.xml"));
        Ok(())
    }
}
