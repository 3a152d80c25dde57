//! Expected components tree: the facility's declared hardware topology.
//!
//! Site → IFC → Beam → DX, plus a BeamToAtaBeams cross-map. The
//! [`ComponentManager`](crate::proxy::manager::ComponentManager) checks
//! every incoming connection's declared name against this tree before
//! accepting it (spec §3, "ExpectedComponentsTree").

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

/// Errors raised while parsing or validating an expected-components manifest.
#[derive(Debug, Error, PartialEq)]
pub enum ComponentsTreeError {
    #[error("missing required header 'sonata expected components v<maj>.<min>'")]
    MissingHeader,

    #[error("line {line}: unsupported manifest version {major}.{minor}")]
    UnsupportedVersion { line: usize, major: u32, minor: u32 },

    #[error("line {line}: malformed entry: {text}")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: ifc '{ifc}' references unknown site '{site}'")]
    UnknownSite { line: usize, ifc: String, site: String },

    #[error("line {line}: beam '{beam}' references unknown ifc '{ifc}'")]
    UnknownIfc { line: usize, beam: String, ifc: String },

    #[error("line {line}: beam-to-ata-beams references unknown beam '{beam}'")]
    UnknownBeamMapping { line: usize, beam: String },

    #[error("tree contains a cycle reaching site '{site}'")]
    Cycle { site: String },

    #[error("beam '{beam}' has no dx coverage")]
    UncoveredBeam { beam: String },
}

/// The highest manifest version this build understands.
const SUPPORTED_MAJOR: u32 = 1;

/// One site in the tree: the top-level facility (e.g. "hat-creek").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteNode {
    pub name: String,
    pub ifcs: Vec<String>,
}

/// One IF-chain node, hung off a site.
#[derive(Clone, Debug, PartialEq)]
pub struct IfcNode {
    pub name: String,
    pub site: String,
    pub beams: Vec<String>,
}

/// One beam node, hung off an IFC, covering zero or more detectors.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamNode {
    pub name: String,
    pub ifc: String,
    pub dxs: Vec<String>,
}

/// The facility's declared hardware topology, as parsed from a manifest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpectedComponentsTree {
    pub sites: HashMap<String, SiteNode>,
    pub ifcs: HashMap<String, IfcNode>,
    pub beams: HashMap<String, BeamNode>,
    /// Cross-map from a beam name to the physical ATA beam names backing it.
    pub beam_to_ata_beams: HashMap<String, Vec<String>>,
}

impl ExpectedComponentsTree {
    /// Parses a manifest of the form:
    ///
    /// ```text
    /// sonata expected components v1.0
    /// # comments start with a hash
    /// site hat-creek
    /// ifc ifc1 hat-creek
    /// beam beam1 ifc1
    /// dx dx1 beam1
    /// dx dx2 beam1
    /// beamtoatabeams beam1 ata1,ata2,ata3
    /// ```
    pub fn parse(manifest: &str) -> Result<Self, ComponentsTreeError> {
        let mut lines = manifest.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

        let (header_line, header) = lines
            .by_ref()
            .find(|(_, l)| !l.is_empty() && !l.starts_with('#'))
            .ok_or(ComponentsTreeError::MissingHeader)?;
        let version = header
            .strip_prefix("sonata expected components v")
            .ok_or(ComponentsTreeError::MissingHeader)?;
        let (major, minor) = parse_version(header_line, version)?;
        if major != SUPPORTED_MAJOR {
            return Err(ComponentsTreeError::UnsupportedVersion {
                line: header_line,
                major,
                minor,
            });
        }

        let mut tree = ExpectedComponentsTree::default();
        for (line_no, raw) in lines {
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = raw.split_whitespace().collect();
            match fields.as_slice() {
                ["site", name] => {
                    tree.sites.insert(
                        name.to_string(),
                        SiteNode {
                            name: name.to_string(),
                            ifcs: Vec::new(),
                        },
                    );
                }
                ["ifc", name, site] => {
                    if !tree.sites.contains_key(*site) {
                        return Err(ComponentsTreeError::UnknownSite {
                            line: line_no,
                            ifc: name.to_string(),
                            site: site.to_string(),
                        });
                    }
                    tree.sites.get_mut(*site).unwrap().ifcs.push(name.to_string());
                    tree.ifcs.insert(
                        name.to_string(),
                        IfcNode {
                            name: name.to_string(),
                            site: site.to_string(),
                            beams: Vec::new(),
                        },
                    );
                }
                ["beam", name, ifc] => {
                    if !tree.ifcs.contains_key(*ifc) {
                        return Err(ComponentsTreeError::UnknownIfc {
                            line: line_no,
                            beam: name.to_string(),
                            ifc: ifc.to_string(),
                        });
                    }
                    tree.ifcs.get_mut(*ifc).unwrap().beams.push(name.to_string());
                    tree.beams.insert(
                        name.to_string(),
                        BeamNode {
                            name: name.to_string(),
                            ifc: ifc.to_string(),
                            dxs: Vec::new(),
                        },
                    );
                }
                ["dx", name, beam] => {
                    let node = tree.beams.get_mut(*beam).ok_or_else(|| {
                        ComponentsTreeError::MalformedLine {
                            line: line_no,
                            text: raw.to_string(),
                        }
                    })?;
                    node.dxs.push(name.to_string());
                }
                ["beamtoatabeams", beam, ata_csv] => {
                    if !tree.beams.contains_key(*beam) {
                        return Err(ComponentsTreeError::UnknownBeamMapping {
                            line: line_no,
                            beam: beam.to_string(),
                        });
                    }
                    let atas = ata_csv.split(',').map(str::to_string).collect();
                    tree.beam_to_ata_beams.insert(beam.to_string(), atas);
                }
                _ => {
                    return Err(ComponentsTreeError::MalformedLine {
                        line: line_no,
                        text: raw.to_string(),
                    })
                }
            }
        }

        tree.validate()?;
        Ok(tree)
    }

    /// Checks the tree is acyclic (trivially true given the parse grammar,
    /// but re-asserted here since future manifest formats may allow
    /// cross-links) and that every beam covers at least one detector.
    fn validate(&self) -> Result<(), ComponentsTreeError> {
        let mut visited_sites = HashSet::new();
        for site in self.sites.keys() {
            if !visited_sites.insert(site.clone()) {
                return Err(ComponentsTreeError::Cycle { site: site.clone() });
            }
        }
        for beam in self.beams.values() {
            if beam.dxs.is_empty() {
                return Err(ComponentsTreeError::UncoveredBeam {
                    beam: beam.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// True if `name` is a component this tree expects to connect, in any role.
    pub fn expects(&self, name: &str) -> bool {
        self.sites.contains_key(name) || self.ifcs.contains_key(name) || self.beams.contains_key(name)
            || self.beams.values().any(|b| b.dxs.iter().any(|d| d == name))
    }

    /// All detector names reachable from `beam`.
    pub fn dxs_for_beam(&self, beam: &str) -> &[String] {
        self.beams.get(beam).map(|b| b.dxs.as_slice()).unwrap_or(&[])
    }
}

impl fmt::Display for ExpectedComponentsTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sonata expected components v{}.0", SUPPORTED_MAJOR)?;
        for site in self.sites.values() {
            writeln!(f, "site {}", site.name)?;
        }
        for ifc in self.ifcs.values() {
            writeln!(f, "ifc {} {}", ifc.name, ifc.site)?;
        }
        for beam in self.beams.values() {
            writeln!(f, "beam {} {}", beam.name, beam.ifc)?;
            for dx in &beam.dxs {
                writeln!(f, "dx {} {}", dx, beam.name)?;
            }
        }
        for (beam, atas) in &self.beam_to_ata_beams {
            writeln!(f, "beamtoatabeams {} {}", beam, atas.join(","))?;
        }
        Ok(())
    }
}

fn parse_version(line: usize, text: &str) -> Result<(u32, u32), ComponentsTreeError> {
    let (major_str, minor_str) = text.split_once('.').ok_or(ComponentsTreeError::MalformedLine {
        line,
        text: text.to_string(),
    })?;
    let major = major_str
        .trim()
        .parse()
        .map_err(|_| ComponentsTreeError::MalformedLine { line, text: text.to_string() })?;
    let minor = minor_str
        .trim()
        .parse()
        .map_err(|_| ComponentsTreeError::MalformedLine { line, text: text.to_string() })?;
    Ok((major, minor))
}
