//! Static prompt templates for the generative operations.

use super::template::PromptTemplate;

/// Persona description prompt.
///
/// Variables: `uploadedData`, `tone`, `responseLength`, `areasOfExpertise`,
/// `knowledgeBoundaries`, `agentName`, `introductoryMessage`, and the optional
/// media variable `avatar`.
pub const AGENT_DESCRIPTION_PROMPT: &str = r#"You are an AI agent generator.  You will generate a description of an AI agent based on the following parameters.

Uploaded Data: {{{uploadedData}}}
Tone: {{{tone}}}
Response Length: {{{responseLength}}}
Areas of Expertise: {{{areasOfExpertise}}}
Knowledge Boundaries: {{{knowledgeBoundaries}}}
Agent Name: {{{agentName}}}
Avatar: {{media url=avatar}}
Introductory Message: {{{introductoryMessage}}}

Describe the AI agent."#;

pub const RESPONSE_SCOPE_PROMPT: &str = r#"You are an AI assistant helping users determine if an AI agent’s response should be limited based on defined parameters.

Parameters: {{{parameters}}}
Prompt: {{{prompt}}}
Agent Response: {{{agentResponse}}}

Determine if the agent’s response is within the scope of the defined parameters. If the response is outside the scope, set shouldLimit to true and provide a reason. Otherwise, set shouldLimit to false and explain why it is within the scope.

Output your answer in JSON format."#;

/// Context question prompt, shared by single answers and chat turns.
pub const CONTEXT_ANSWER_PROMPT: &str = r#"You are an intelligent chatbot. Your task is to answer the user's question based on the provided context data. If the context data does not contain the answer, use your general knowledge to respond.

Context Data:
{{{contextData}}}

User's Question:
"{{{question}}}"

Please provide a clear and concise answer."#;

pub const AGENT_DESCRIPTION: PromptTemplate =
    PromptTemplate::new("generate_agent_description", AGENT_DESCRIPTION_PROMPT);

pub const RESPONSE_SCOPE: PromptTemplate =
    PromptTemplate::new("evaluate_response_scope", RESPONSE_SCOPE_PROMPT);

pub const CONTEXT_ANSWER: PromptTemplate =
    PromptTemplate::new("answer_from_context", CONTEXT_ANSWER_PROMPT);

pub const CHAT_TURN: PromptTemplate = PromptTemplate::new("chat_turn", CONTEXT_ANSWER_PROMPT);
