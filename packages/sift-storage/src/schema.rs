pub fn render_schema() -> String {
	"\
CREATE TABLE IF NOT EXISTS collections (
	tenant_id        TEXT        NOT NULL,
	name             TEXT        NOT NULL,
	visibility       TEXT        NOT NULL DEFAULT 'tenant',
	organization_id  TEXT,
	allowed_roles    TEXT,
	allowed_user_ids TEXT,
	created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
	PRIMARY KEY (tenant_id, name)
);
CREATE INDEX IF NOT EXISTS collections_tenant_idx ON collections (tenant_id)"
		.to_string()
}
