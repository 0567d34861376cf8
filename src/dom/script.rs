//! Page-side scripts used by the Chrome driver.
//!
//! Every element operation is one `Runtime.evaluate` of an IIFE that carries
//! the locator runtime, resolves the serialized [`Locator`] and performs the
//! action. Results come back as plain JSON objects.

use super::locator::{FrameScope, Locator};
use crate::types::Point;

/// Resolves serialized locators against the live DOM, including frames.
/// Cross-origin frames are only reachable when the browser runs without site
/// isolation (see `ChromeBrowser`).
pub const LOCATOR_RUNTIME: &str = r#"
const __bx = (() => {
    const matchPart = (root, part) => {
        if (part.kind === 'css') {
            return Array.from(root.querySelectorAll(part.value));
        }
        if (part.kind === 'xpath') {
            const doc = root.ownerDocument || root;
            const snap = doc.evaluate(part.value, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const out = [];
            for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
            return out;
        }
        if (part.kind === 'text') {
            const needle = part.text.toLowerCase();
            return Array.from(root.querySelectorAll(part.css || '*'))
                .filter(el => (el.textContent || '').toLowerCase().includes(needle));
        }
        return [];
    };
    const byDocumentOrder = (a, b) => {
        if (a === b) return 0;
        return (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1;
    };
    const matchSelector = (roots, selector) => {
        const seen = new Set();
        for (const root of roots) {
            for (const part of selector.alternatives) {
                try {
                    for (const el of matchPart(root, part)) seen.add(el);
                } catch (e) {
                    // an invalid alternative must not hide the others
                }
            }
        }
        return Array.from(seen).sort(byDocumentOrder);
    };
    const frameElements = (frames) => {
        let doc = document;
        const chain = [];
        for (const frame of frames) {
            const el = matchSelector([doc], frame)[0];
            if (!el) return null;
            let inner = null;
            try { inner = el.contentDocument; } catch (e) { inner = null; }
            if (!inner) return null;
            chain.push(el);
            doc = inner;
        }
        return { doc, chain };
    };
    const documentFor = (frames) => {
        const found = frameElements(frames);
        return found ? found.doc : null;
    };
    const frameOffset = (frames) => {
        const found = frameElements(frames);
        let x = 0, y = 0;
        if (!found) return { x, y };
        for (const el of found.chain) {
            const r = el.getBoundingClientRect();
            x += r.left + el.clientLeft;
            y += r.top + el.clientTop;
        }
        return { x, y };
    };
    const resolve = (loc) => {
        const doc = documentFor(loc.frames);
        if (!doc) return [];
        let nodes = [doc];
        for (const step of loc.steps) {
            nodes = matchSelector(nodes, step.selector);
            if (step.hasText) {
                const needle = step.hasText.toLowerCase();
                nodes = nodes.filter(el => (el.textContent || '').toLowerCase().includes(needle));
            }
            if (step.index !== null && step.index !== undefined) {
                nodes = nodes[step.index] ? [nodes[step.index]] : [];
            }
        }
        return nodes;
    };
    const visible = (el) => {
        if (!el || !el.isConnected) return false;
        const rect = el.getBoundingClientRect();
        const style = el.ownerDocument.defaultView.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0 &&
            style.visibility !== 'hidden' && style.display !== 'none' &&
            parseFloat(style.opacity || '1') > 0;
    };
    const enabled = (el) => !!el && !el.disabled && el.getAttribute('aria-disabled') !== 'true';
    const mouse = (el, type, x, y, extra) => {
        const view = el.ownerDocument.defaultView;
        const init = Object.assign({ bubbles: true, cancelable: true, composed: true, clientX: x, clientY: y, view }, extra || {});
        const Ctor = type.startsWith('pointer') ? view.PointerEvent
            : (type.startsWith('drag') || type === 'drop') ? view.DragEvent
            : view.MouseEvent;
        el.dispatchEvent(new Ctor(type, init));
    };
    const center = (el) => {
        const r = el.getBoundingClientRect();
        return { x: r.left + r.width / 2, y: r.top + r.height / 2 };
    };
    return { resolve, documentFor, frameOffset, visible, enabled, mouse, center };
})();
"#;

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Wraps `body` so it runs with `__els` bound to the resolved elements.
pub fn with_elements(locator: &Locator, body: &str) -> String {
    format!(
        "(function() {{\n{runtime}\nconst __loc = {loc};\nconst __els = __bx.resolve(__loc);\n{body}\n}})()",
        runtime = LOCATOR_RUNTIME,
        loc = locator.to_json(),
        body = body,
    )
}

/// Snapshot used for actionability polling.
pub fn probe(locator: &Locator) -> String {
    with_elements(
        locator,
        r#"
        const el = __els[0];
        return {
            count: __els.length,
            visible: !!el && __bx.visible(el),
            enabled: !!el && __bx.enabled(el),
            editable: !!el && __bx.enabled(el) && !el.readOnly
        };
        "#,
    )
}

pub fn count(locator: &Locator) -> String {
    with_elements(locator, "return __els.length;")
}

pub fn click(locator: &Locator, button: u8, click_count: u32) -> String {
    with_elements(
        locator,
        &format!(
            r#"
            const el = __els[0];
            if (!el) return {{ success: false, error: 'Element not found' }};
            try {{
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                const p = __bx.center(el);
                const button = {button};
                for (let i = 1; i <= {count}; i++) {{
                    __bx.mouse(el, 'pointerdown', p.x, p.y, {{ button, detail: i }});
                    __bx.mouse(el, 'mousedown', p.x, p.y, {{ button, detail: i }});
                    if (i === 1 && typeof el.focus === 'function') el.focus();
                    __bx.mouse(el, 'pointerup', p.x, p.y, {{ button, detail: i }});
                    __bx.mouse(el, 'mouseup', p.x, p.y, {{ button, detail: i }});
                    if (button === 0) {{
                        el.click();
                    }} else if (button === 2) {{
                        __bx.mouse(el, 'contextmenu', p.x, p.y, {{ button }});
                    }}
                }}
                if ({count} === 2) __bx.mouse(el, 'dblclick', p.x, p.y, {{ button, detail: 2 }});
                return {{ success: true, tag: el.tagName.toLowerCase() }};
            }} catch (e) {{
                return {{ success: false, error: e.message }};
            }}
            "#,
            button = button,
            count = click_count.max(1),
        ),
    )
}

pub fn hover(locator: &Locator) -> String {
    with_elements(
        locator,
        r#"
        const el = __els[0];
        if (!el) return { success: false, error: 'Element not found' };
        el.scrollIntoView({ block: 'center' });
        const p = __bx.center(el);
        ['pointerover', 'pointerenter', 'mouseover', 'mouseenter', 'pointermove', 'mousemove']
            .forEach(type => __bx.mouse(el, type, p.x, p.y));
        return { success: true };
        "#,
    )
}

/// Replaces the value through the native setter so framework-controlled
/// inputs observe the change.
pub fn fill(locator: &Locator, value: &str) -> String {
    with_elements(
        locator,
        &format!(
            r#"
            const el = __els[0];
            if (!el) return {{ success: false, error: 'Element not found' }};
            const value = {value};
            try {{
                el.focus();
                const view = el.ownerDocument.defaultView;
                if (el.isContentEditable) {{
                    el.textContent = value;
                }} else {{
                    const proto = el.tagName === 'TEXTAREA'
                        ? view.HTMLTextAreaElement.prototype
                        : view.HTMLInputElement.prototype;
                    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                    setter.call(el, value);
                }}
                el.dispatchEvent(new view.Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new view.Event('change', {{ bubbles: true }}));
                return {{ success: true, finalValue: el.isContentEditable ? el.textContent : el.value }};
            }} catch (e) {{
                return {{ success: false, error: e.message }};
            }}
            "#,
            value = js_string(value),
        ),
    )
}

pub fn focus(locator: &Locator) -> String {
    with_elements(
        locator,
        r#"
        const el = __els[0];
        if (!el) return { success: false, error: 'Element not found' };
        el.scrollIntoView({ block: 'center' });
        el.focus();
        return { success: true };
        "#,
    )
}

pub fn text_content(locator: &Locator) -> String {
    with_elements(
        locator,
        "const el = __els[0]; return el ? el.textContent : null;",
    )
}

pub fn input_value(locator: &Locator) -> String {
    with_elements(
        locator,
        r#"
        const el = __els[0];
        if (!el) return null;
        return el.isContentEditable ? el.textContent : (el.value ?? '');
        "#,
    )
}

pub fn attribute(locator: &Locator, name: &str) -> String {
    with_elements(
        locator,
        &format!(
            "const el = __els[0]; return el ? el.getAttribute({}) : null;",
            js_string(name)
        ),
    )
}

pub fn bounding_box(locator: &Locator) -> String {
    with_elements(
        locator,
        r#"
        const el = __els[0];
        if (!el) return null;
        const r = el.getBoundingClientRect();
        const offset = __bx.frameOffset(__loc.frames);
        return { x: r.left + offset.x, y: r.top + offset.y, width: r.width, height: r.height };
        "#,
    )
}

pub fn select_option(locator: &Locator, value: &str) -> String {
    with_elements(
        locator,
        &format!(
            r#"
            const el = __els[0];
            if (!el) return {{ success: false, error: 'Element not found' }};
            const wanted = {value};
            const option = Array.from(el.options || [])
                .find(o => o.value === wanted || o.label === wanted || o.textContent.trim() === wanted);
            if (!option) return {{ success: false, error: 'Option not found: ' + wanted }};
            el.value = option.value;
            const view = el.ownerDocument.defaultView;
            el.dispatchEvent(new view.Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new view.Event('change', {{ bubbles: true }}));
            return {{ success: true }};
            "#,
            value = js_string(value),
        ),
    )
}

pub fn set_checked(locator: &Locator, checked: bool) -> String {
    with_elements(
        locator,
        &format!(
            r#"
            const el = __els[0];
            if (!el) return {{ success: false, error: 'Element not found' }};
            if (!!el.checked !== {checked}) el.click();
            return {{ success: !!el.checked === {checked} }};
            "#,
            checked = checked,
        ),
    )
}

pub fn scroll_into_view(locator: &Locator) -> String {
    with_elements(
        locator,
        r#"
        const el = __els[0];
        if (!el) return { success: false, error: 'Element not found' };
        el.scrollIntoView({ block: 'center', inline: 'nearest' });
        return { success: true };
        "#,
    )
}

/// Synthesizes both HTML5 drag events and the mouse sequence, since builders
/// differ in which one they listen to.
pub fn drag_to(source: &Locator, target: &Locator, position: Option<Point>) -> String {
    let position = match position {
        Some(p) => format!("{{ x: {}, y: {} }}", p.x, p.y),
        None => "null".to_string(),
    };
    with_elements(
        source,
        &format!(
            r#"
            const src = __els[0];
            const dst = __bx.resolve({target})[0];
            if (!src) return {{ success: false, error: 'Drag source not found' }};
            if (!dst) return {{ success: false, error: 'Drop target not found' }};
            try {{
                src.scrollIntoView({{ block: 'center' }});
                const pos = {position};
                const from = __bx.center(src);
                const r = dst.getBoundingClientRect();
                const to = pos
                    ? {{ x: r.left + pos.x, y: r.top + pos.y }}
                    : {{ x: r.left + r.width / 2, y: r.top + r.height / 2 }};
                const dataTransfer = new DataTransfer();
                __bx.mouse(src, 'pointerdown', from.x, from.y);
                __bx.mouse(src, 'mousedown', from.x, from.y);
                __bx.mouse(src, 'dragstart', from.x, from.y, {{ dataTransfer }});
                __bx.mouse(src, 'mousemove', from.x + 5, from.y + 5);
                __bx.mouse(dst, 'dragenter', to.x, to.y, {{ dataTransfer }});
                __bx.mouse(dst, 'dragover', to.x, to.y, {{ dataTransfer }});
                __bx.mouse(dst, 'mousemove', to.x, to.y);
                __bx.mouse(dst, 'drop', to.x, to.y, {{ dataTransfer }});
                __bx.mouse(src, 'dragend', to.x, to.y, {{ dataTransfer }});
                __bx.mouse(dst, 'pointerup', to.x, to.y);
                __bx.mouse(dst, 'mouseup', to.x, to.y);
                return {{ success: true }};
            }} catch (e) {{
                return {{ success: false, error: e.message }};
            }}
            "#,
            target = target.to_json(),
            position = position,
        ),
    )
}

/// Evaluates `script` in the window of `frame`. A missing frame yields
/// `{ "__missingFrame": true }` instead of throwing.
pub fn in_frame(frame: &FrameScope, script: &str) -> String {
    if frame.is_top() {
        return script.to_string();
    }
    let frames = serde_json::to_string(&frame.frames).unwrap_or_else(|_| "[]".to_string());
    format!(
        "(function() {{\n{runtime}\nconst __doc = __bx.documentFor({frames});\nif (!__doc) return {{ __missingFrame: true }};\nreturn __doc.defaultView.eval({script});\n}})()",
        runtime = LOCATOR_RUNTIME,
        frames = frames,
        script = js_string(script),
    )
}

/// Loaded-state probe; resource counts let the caller detect network idle.
pub const READY_STATE_PROBE: &str = r#"
(function() {
    return {
        readyState: document.readyState,
        url: window.location.href,
        resources: performance.getEntriesByType('resource').length
    };
})()
"#;

/// Collects local and session storage for the top document and every frame
/// the page can reach.
pub const STORAGE_SNAPSHOT: &str = r#"
(function() {
    const dump = (store) => {
        const out = [];
        for (let i = 0; i < store.length; i++) {
            const key = store.key(i);
            if (key !== null) out.push({ name: key, value: store.getItem(key) });
        }
        return out;
    };
    const origins = [];
    const seen = new Set();
    const visit = (win) => {
        try {
            const origin = win.location.origin;
            if (origin && origin !== 'null' && !seen.has(origin)) {
                seen.add(origin);
                origins.push({
                    origin,
                    localStorage: dump(win.localStorage),
                    sessionStorage: dump(win.sessionStorage)
                });
            }
            for (let i = 0; i < win.frames.length; i++) visit(win.frames[i]);
        } catch (e) {
            // frame not reachable from this context
        }
    };
    visit(window);
    return origins;
})()
"#;

pub fn restore_storage(local: &str, session: &str) -> String {
    format!(
        r#"
        (function() {{
            const local = {local};
            const session = {session};
            let count = 0;
            try {{
                for (const entry of local) {{ localStorage.setItem(entry.name, entry.value); count++; }}
                for (const entry of session) {{ sessionStorage.setItem(entry.name, entry.value); count++; }}
                return {{ success: true, count }};
            }} catch (error) {{
                return {{ success: false, error: error.message, count }};
            }}
        }})()
        "#,
        local = local,
        session = session,
    )
}
