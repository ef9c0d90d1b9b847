//! SPARQL result sets, result handlers and results readers.

use oxigraph::{
    model::{Term, Variable},
    sparql::{
        QuerySolution,
        results::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput},
    },
};

use crate::mime::CodecError;

/// Receives SPARQL results as a response is parsed
pub trait ResultsHandler: Send {
    fn handle_boolean(&mut self, value: bool);

    fn handle_variables(&mut self, variables: &[Variable]);

    fn handle_solution(&mut self, solution: QuerySolution);
}

/// Parses a SPARQL results payload into a handler
pub trait ResultsReader: Send + Sync {
    fn read(&self, body: &[u8], handler: &mut dyn ResultsHandler) -> Result<(), CodecError>;
}

/// In-memory SPARQL results: either a boolean or a table of solutions.
#[derive(Debug, Default)]
pub struct SparqlResultSet {
    boolean: Option<bool>,
    variables: Vec<Variable>,
    solutions: Vec<QuerySolution>,
}

impl SparqlResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// ASK answer, `None` for a solutions result.
    pub fn boolean(&self) -> Option<bool> {
        self.boolean
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn solutions(&self) -> &[QuerySolution] {
        &self.solutions
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boolean.is_none() && self.solutions.is_empty()
    }

    /// Values bound to `variable` across all solutions, skipping unbound rows.
    pub fn column<'a>(&'a self, variable: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.solutions
            .iter()
            .filter_map(move |solution| solution.get(variable))
    }
}

impl ResultsHandler for SparqlResultSet {
    fn handle_boolean(&mut self, value: bool) {
        self.boolean = Some(value);
    }

    fn handle_variables(&mut self, variables: &[Variable]) {
        self.variables = variables.to_vec();
    }

    fn handle_solution(&mut self, solution: QuerySolution) {
        self.solutions.push(solution);
    }
}

/// Reader for the results syntaxes oxigraph parses
#[derive(Debug, Clone, Copy)]
pub struct OxigraphResultsReader {
    format: QueryResultsFormat,
}

impl OxigraphResultsReader {
    pub fn new(format: QueryResultsFormat) -> Self {
        Self { format }
    }
}

impl ResultsReader for OxigraphResultsReader {
    fn read(&self, body: &[u8], handler: &mut dyn ResultsHandler) -> Result<(), CodecError> {
        let parsed = QueryResultsParser::from_format(self.format)
            .for_reader(body)
            .map_err(|e| CodecError(format!("invalid {} results: {}", self.format.name(), e)))?;
        match parsed {
            ReaderQueryResultsParserOutput::Boolean(value) => handler.handle_boolean(value),
            ReaderQueryResultsParserOutput::Solutions(solutions) => {
                handler.handle_variables(solutions.variables());
                for solution in solutions {
                    let solution = solution.map_err(|e| {
                        CodecError(format!("invalid {} results: {}", self.format.name(), e))
                    })?;
                    handler.handle_solution(solution);
                }
            }
        }
        Ok(())
    }
}

/// Reader for a bare `true`/`false` ASK answer sent as plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanResultsReader;

impl ResultsReader for BooleanResultsReader {
    fn read(&self, body: &[u8], handler: &mut dyn ResultsHandler) -> Result<(), CodecError> {
        let text = String::from_utf8_lossy(body);
        match text.trim().to_ascii_lowercase().as_str() {
            "true" => handler.handle_boolean(true),
            "false" => handler.handle_boolean(false),
            other => {
                return Err(CodecError(format!(
                    "expected a boolean ASK answer, got '{}'",
                    other.chars().take(32).collect::<String>()
                )));
            }
        }
        Ok(())
    }
}
