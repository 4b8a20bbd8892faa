//! Block parser and validator for composite model schemas

use super::lexer::{SchemaBlock, parse_blocks};
use composer_core::{ComposerError, DependencyConstraint, Result, StatType, casefold};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Reserved directive for dependence constraints
pub const DEPENDENT: &str = "dependent";
/// Reserved directive for independence constraints
pub const INDEPENDENT: &str = "independent";
/// Keyword separating a foreign column from its parents
pub const GIVEN: &str = "given";

/// What a directive keyword means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Columns modeled by the base model
    Base,
    /// Column modeled by the named predictor builder
    Predictor(String),
    /// Pairwise dependence (`true`) or independence (`false`) constraint
    Constraint(bool),
}

/// Closed name → directive lookup table, built from the registry at parse time
#[derive(Debug, Clone)]
pub struct DirectiveTable {
    entries: HashMap<String, Directive>,
}

impl DirectiveTable {
    /// Build the table from base-model aliases and registered builder names
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SchemaError` if a builder name shadows a
    /// reserved directive
    pub fn new<A, B>(base_aliases: A, builder_names: B) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let mut entries = HashMap::new();
        entries.insert(DEPENDENT.to_string(), Directive::Constraint(true));
        entries.insert(INDEPENDENT.to_string(), Directive::Constraint(false));
        for alias in base_aliases {
            entries.insert(casefold(alias.as_ref()), Directive::Base);
        }
        for name in builder_names {
            let name = casefold(name.as_ref());
            if entries.contains_key(&name) {
                return Err(ComposerError::schema(format!(
                    "Predictor name \"{name}\" collides with a reserved directive"
                )));
            }
            entries.insert(name.clone(), Directive::Predictor(name));
        }
        Ok(Self { entries })
    }

    /// Resolve a directive keyword
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Directive> {
        self.entries.get(&casefold(name))
    }

    /// Known directive names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Validated result of parsing a schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSchema {
    /// Every declared column and its stattype, in declaration order
    pub columns: IndexMap<String, StatType>,
    /// Columns modeled by the base model
    pub local: IndexSet<String>,
    /// Columns modeled by foreign predictors
    pub foreign: IndexSet<String>,
    /// Parents of each foreign column
    pub parents: IndexMap<String, Vec<String>>,
    /// Builder name of each foreign column
    pub predictors: IndexMap<String, String>,
    /// Dependency constraints passed through to the base model
    pub dependencies: Vec<DependencyConstraint>,
}

/// Read-only cursor over one block's tokens
struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
    block: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [String], block: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            block,
        }
    }

    /// Next non-comma token, case-folded
    fn next_word(&mut self) -> Option<String> {
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            if token != "," {
                return Some(casefold(token));
            }
        }
        None
    }

    fn location(&self) -> String {
        format!("block {}, token {}", self.block, self.pos.saturating_sub(1))
    }

    fn error(&self, message: impl Into<String>) -> ComposerError {
        ComposerError::schema_at(message, self.location())
    }

    fn stattype(&mut self, column: &str) -> Result<StatType> {
        let word = self
            .next_word()
            .ok_or_else(|| self.error(format!("Missing stattype for column \"{column}\"")))?;
        word.parse::<StatType>()
            .map_err(|_| self.error(format!("Invalid stattype \"{word}\"")))
    }

    fn rest(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.next_word()).collect()
    }
}

/// Parser for composite model schemas
pub struct SchemaParser {
    directives: DirectiveTable,
}

impl SchemaParser {
    /// Create a parser over a directive table
    #[must_use]
    pub fn new(directives: DirectiveTable) -> Self {
        Self { directives }
    }

    /// Parse schema text in the mini-language
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SchemaError` if the text is malformed or the
    /// schema is invalid
    pub fn parse_str(&self, text: &str) -> Result<ParsedSchema> {
        self.parse(&parse_blocks(text)?)
    }

    /// Parse and validate a block sequence
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SchemaError` on an unknown directive or
    /// stattype, a duplicate column, an undeclared parent, a column that is
    /// both local and foreign, a self-parent, or a non-local column in a
    /// dependency constraint
    pub fn parse(&self, blocks: &[SchemaBlock]) -> Result<ParsedSchema> {
        let mut columns = IndexMap::new();
        let mut local = Vec::new();
        let mut foreign = Vec::new();
        let mut parents = IndexMap::new();
        let mut predictors = IndexMap::new();
        let mut dependencies = Vec::new();

        for (index, block) in blocks.iter().enumerate() {
            if block.directive.is_empty() && block.tokens.is_empty() {
                continue;
            }
            let directive = self.directives.lookup(&block.directive).ok_or_else(|| {
                ComposerError::schema_at(
                    format!(
                        "Unknown directive \"{}\". Available directives: {}",
                        casefold(&block.directive),
                        self.directives.names().join(", ")
                    ),
                    format!("block {index}"),
                )
            })?;
            let mut cursor = Cursor::new(&block.tokens, index);

            match directive {
                Directive::Base => {
                    while let Some(column) = cursor.next_word() {
                        let stattype = cursor.stattype(&column)?;
                        columns.insert(column.clone(), stattype);
                        local.push(column);
                    }
                }
                Directive::Constraint(dependent) => {
                    dependencies.push(DependencyConstraint {
                        dependent: *dependent,
                        columns: cursor.rest(),
                    });
                }
                Directive::Predictor(name) => {
                    let column = cursor
                        .next_word()
                        .ok_or_else(|| cursor.error("Missing foreign column name"))?;
                    let stattype = cursor.stattype(&column)?;
                    match cursor.next_word() {
                        Some(word) if word == GIVEN => {}
                        Some(word) => {
                            return Err(cursor.error(format!(
                                "Expected GIVEN keyword, received \"{word}\""
                            )));
                        }
                        None => return Err(cursor.error("Expected GIVEN keyword")),
                    }
                    let conditions = cursor.rest();
                    if conditions.is_empty() {
                        return Err(cursor.error(format!(
                            "Foreign column \"{column}\" must name at least one parent"
                        )));
                    }
                    columns.insert(column.clone(), stattype);
                    foreign.push(column.clone());
                    parents.insert(column.clone(), conditions);
                    predictors.insert(column, name.clone());
                }
            }
        }

        let local = unique(local, "default")?;
        let foreign = unique(foreign, "foreign")?;

        for (column, conditions) in &parents {
            for parent in conditions {
                if !columns.contains_key(parent) {
                    return Err(ComposerError::schema(format!(
                        "No stattype declaration for \"{parent}\""
                    )));
                }
                if parent == column {
                    return Err(ComposerError::schema(format!(
                        "Column \"{column}\" cannot be its own parent"
                    )));
                }
            }
        }

        if let Some(column) = local.iter().find(|c| foreign.contains(*c)) {
            return Err(ComposerError::schema(format!(
                "Column \"{column}\" can only be modeled once"
            )));
        }

        for constraint in &dependencies {
            if let Some(column) = constraint.columns.iter().find(|c| !local.contains(*c)) {
                return Err(ComposerError::schema(format!(
                    "Column \"{column}\" with dependency constraint must have default model"
                )));
            }
        }

        Ok(ParsedSchema {
            columns,
            local,
            foreign,
            parents,
            predictors,
            dependencies,
        })
    }
}

fn unique(columns: Vec<String>, kind: &str) -> Result<IndexSet<String>> {
    let mut set = IndexSet::with_capacity(columns.len());
    for column in columns {
        if !set.insert(column.clone()) {
            return Err(ComposerError::schema(format!(
                "Duplicate {kind} column encountered: \"{column}\""
            )));
        }
    }
    Ok(set)
}
