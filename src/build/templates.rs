// ABOUTME: Catalog of build-file templates keyed by runtime and version.
// ABOUTME: `node/18` resolves to a node 18 base image plus install and start boilerplate.

use super::error::BuildError;

/// Runtimes with a template, in the order they are listed to users.
pub const RUNTIMES: &[&str] = &["node", "php", "python", "ruby"];

fn body(runtime: &str) -> Option<&'static str> {
    let body = match runtime {
        "node" => {
            r#"RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app
COPY ./package.json /usr/src/app/
RUN npm install --production
COPY ./ /usr/src/app
ENV NODE_ENV production
ENV PORT 80
EXPOSE 80
CMD [ "npm", "start" ]"#
        }
        "php" => {
            r#"COPY ./ /var/www/html/
RUN chown -R www-data:www-data /var/www/html
EXPOSE 80"#
        }
        "python" => {
            r#"RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app
COPY ./requirements.txt /usr/src/app/
RUN pip install --no-cache-dir -r requirements.txt
COPY ./ /usr/src/app
ENV PORT 80
EXPOSE 80
CMD [ "python", "app.py" ]"#
        }
        "ruby" => {
            r#"RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app
COPY ./Gemfile ./Gemfile.lock /usr/src/app/
RUN bundle install --without development test
COPY ./ /usr/src/app
ENV PORT 80
EXPOSE 80
CMD [ "bundle", "exec", "ruby", "app.rb", "-o", "0.0.0.0", "-p", "80" ]"#
        }
        _ => return None,
    };
    Some(body)
}

fn base_image(runtime: &str, version: &str) -> String {
    match runtime {
        "php" => format!("php:{}-apache", version),
        other => format!("{}:{}", other, version),
    }
}

/// Resolve `runtime/version` to build-file text.
pub fn resolve(template_id: &str) -> Result<String, BuildError> {
    let unknown = || BuildError::UnknownTemplate(template_id.to_string());

    let (runtime, version) = template_id.split_once('/').ok_or_else(unknown)?;
    let (runtime, version) = (runtime.trim(), version.trim());
    if version.is_empty()
        || !version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(unknown());
    }

    let body = body(runtime).ok_or_else(unknown)?;
    Ok(format!("FROM {}\n{}\n", base_image(runtime, version), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_runtime_resolves() {
        for runtime in RUNTIMES {
            let file = resolve(&format!("{}/3", runtime)).unwrap();
            assert!(file.starts_with("FROM "), "{runtime}: {file}");
        }
    }

    #[test]
    fn version_is_part_of_base_image() {
        assert!(resolve("node/18").unwrap().starts_with("FROM node:18\n"));
        assert!(resolve("php/8.2").unwrap().starts_with("FROM php:8.2-apache\n"));
    }

    #[test]
    fn unknown_or_incomplete_templates_rejected() {
        for id in ["node", "node/", "java/17", "node/18 && rm -rf /"] {
            assert!(
                matches!(resolve(id), Err(BuildError::UnknownTemplate(_))),
                "{id} should be rejected"
            );
        }
    }
}
