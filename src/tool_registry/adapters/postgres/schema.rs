//! Diesel schema for tool catalog persistence.

diesel::table! {
    /// MCP server records.
    mcp_servers (id) {
        /// Internal server identifier.
        id -> Uuid,
        /// Human-readable server name.
        #[max_length = 100]
        name -> Varchar,
        /// Transport configuration as JSONB.
        transport -> Jsonb,
        /// Runtime status.
        #[max_length = 50]
        status -> Varchar,
        /// Owning user.
        owner_id -> Nullable<Text>,
        /// Tag set as a JSONB array.
        tags -> Jsonb,
        /// Auto-start flag.
        auto_start -> Bool,
        /// Request timeout in milliseconds.
        timeout_ms -> Int8,
        /// Cached tool count.
        tool_count -> Int4,
        /// Last discovery timestamp.
        last_discovery -> Nullable<Timestamptz>,
        /// Fingerprint of the last discovered catalog.
        catalog_fingerprint -> Nullable<Text>,
        /// Last error message.
        error_message -> Nullable<Text>,
        /// Last health report as JSONB.
        last_health -> Nullable<Jsonb>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Discovered tool records.
    mcp_tools (server_id, name) {
        /// Owning server.
        server_id -> Uuid,
        /// Tool name.
        name -> Text,
        /// Full tool definition as JSONB.
        definition -> Jsonb,
        /// Rolling execution metrics as JSONB.
        metrics -> Jsonb,
        /// Discovery timestamp.
        discovered_at -> Timestamptz,
    }
}

diesel::table! {
    /// Discovered resource records.
    mcp_resources (server_id, uri) {
        /// Owning server.
        server_id -> Uuid,
        /// Resource URI.
        uri -> Text,
        /// Full resource definition as JSONB.
        definition -> Jsonb,
        /// Discovery timestamp.
        discovered_at -> Timestamptz,
    }
}

diesel::joinable!(mcp_tools -> mcp_servers (server_id));
diesel::joinable!(mcp_resources -> mcp_servers (server_id));
diesel::allow_tables_to_appear_in_same_query!(mcp_servers, mcp_tools, mcp_resources);
