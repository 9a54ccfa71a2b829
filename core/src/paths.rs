//! Gateway paths of the remote capabilities built on this client.
//!
//! The client itself never uses these; endpoint wrappers pass them as the
//! `path` argument of a `GatewayClient` builder. Conversation, dataset and
//! RAG paths go through `build_request` on the app gateway. Knowledge base,
//! chunk and component paths belong to the console OpenAPI and go through
//! `build_openapi_request` / `build_openapi_query_request`.

pub const CREATE_CONVERSATION: &str = "/app/conversation";
pub const UPLOAD_FILE: &str = "/app/conversation/file/upload";
pub const RUN: &str = "/app/conversation/runs";
pub const FEEDBACK: &str = "/app/conversation/feedback";

// Console OpenAPI.
pub const KNOWLEDGE_BASE_UPLOAD_FILE: &str = "/file";
pub const KNOWLEDGE_BASE_DOCUMENT: &str = "/knowledge_base/document";
pub const KNOWLEDGE_BASE_DOCUMENTS: &str = "/knowledge_base/documents";
pub const KNOWLEDGE_BASE_CREATE: &str = "/knowledgeBase?Action=CreateKnowledgeBase";
pub const KNOWLEDGE_BASE_DESCRIBE: &str = "/knowledgeBase?Action=DescribeKnowledgeBase";
pub const KNOWLEDGE_BASE_DELETE: &str = "/knowledgeBase?Action=DeleteKnowledgeBase";
pub const KNOWLEDGE_BASE_LIST: &str = "/knowledgeBase?Action=DescribeKnowledgeBases";
pub const KNOWLEDGE_BASE_MODIFY: &str = "/knowledgeBase?Action=ModifyKnowledgeBase";
pub const KNOWLEDGE_BASE_QUERY: &str = "/knowledgebases/query";

pub const CHUNK_CREATE: &str = "/knowledgeBase?Action=CreateChunk";
pub const CHUNK_MODIFY: &str = "/knowledgeBase?Action=ModifyChunk";
pub const CHUNK_DESCRIBE: &str = "/knowledgeBase?Action=DescribeChunk";
pub const CHUNKS_DESCRIBE: &str = "/knowledgeBase?Action=DescribeChunks";
pub const CHUNK_DELETE: &str = "/knowledgeBase?Action=DeleteChunk";

pub const COMPONENT_RUN: &str = "/components";
pub const AI_SEARCH: &str = "/ai_search/chat/completions";

// Dataset and RAG endpoints live under the older agi_platform prefix.
pub const RAG_RUN: &str = "/api/v1/ai_engine/agi_platform/v1/instance/integrated";
pub const DATASET_CREATE: &str = "/api/v1/ai_engine/agi_platform/v1/datasets/create";
pub const DATASET_ADD_FILE: &str = "/api/v1/ai_engine/agi_platform/v1/datasets/documents";
pub const DATASET_LIST_FILES: &str = "/api/v1/ai_engine/agi_platform/v1/datasets/documents/list_page";
pub const DATASET_DELETE_FILE: &str = "/api/v1/ai_engine/agi_platform/v1/datasets/document/delete";
pub const DATASET_UPLOAD_FILE: &str = "/api/v1/ai_engine/agi_platform/v1/datasets/files/upload";
